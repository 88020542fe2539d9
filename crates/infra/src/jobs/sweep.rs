//! Periodic threshold sweep.
//!
//! Movement-triggered evaluation only sees balances that change; expiry alerts
//! depend on the calendar, so every company is re-evaluated on an interval.

use std::io;
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::engine::StockEngine;

/// Totals across all runs of one sweeper.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub runs: u64,
    pub alerts_created: u64,
    pub alerts_updated: u64,
    pub failures: u64,
}

/// Handle to stop a running sweeper.
#[derive(Debug)]
pub struct SweepHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
    stats: Arc<Mutex<SweepStats>>,
}

impl SweepHandle {
    /// Request graceful shutdown and wait for the current run to finish.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }

    pub fn stats(&self) -> SweepStats {
        self.stats.lock().map(|s| *s).unwrap_or_default()
    }
}

#[derive(Debug)]
pub struct ThresholdSweep;

impl ThresholdSweep {
    /// Spawn the sweeper. The first run happens one `interval` after spawning.
    pub fn spawn(engine: Arc<StockEngine>, interval: Duration) -> io::Result<SweepHandle> {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let stats = Arc::new(Mutex::new(SweepStats::default()));
        let worker_stats = stats.clone();

        let join = thread::Builder::new()
            .name("threshold-sweep".to_string())
            .spawn(move || {
                info!(interval_ms = interval.as_millis() as u64, "threshold sweep started");
                loop {
                    match shutdown_rx.recv_timeout(interval) {
                        Err(mpsc::RecvTimeoutError::Timeout) => {
                            let run = sweep_once(&engine);
                            if let Ok(mut s) = worker_stats.lock() {
                                s.runs += 1;
                                s.alerts_created += run.alerts_created;
                                s.alerts_updated += run.alerts_updated;
                                s.failures += run.failures;
                            }
                        }
                        Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
                    }
                }
                info!("threshold sweep stopped");
            })?;

        Ok(SweepHandle {
            shutdown: shutdown_tx,
            join: Some(join),
            stats,
        })
    }
}

/// One pass over every company. A failing company does not stop the others.
pub fn sweep_once(engine: &StockEngine) -> SweepStats {
    let mut stats = SweepStats::default();

    let companies = match engine.companies() {
        Ok(c) => c,
        Err(err) => {
            error!(code = err.code(), error = %err, "threshold sweep could not list companies");
            stats.failures += 1;
            return stats;
        }
    };

    for tenant_id in companies {
        match engine.generate_alerts(tenant_id) {
            Ok(report) => {
                stats.alerts_created += report.created as u64;
                stats.alerts_updated += report.updated as u64;
            }
            Err(err) => {
                error!(company_id = %tenant_id, code = err.code(), error = %err, "threshold sweep failed");
                stats.failures += 1;
            }
        }
    }

    debug!(
        created = stats.alerts_created,
        updated = stats.alerts_updated,
        failures = stats.failures,
        "threshold sweep pass finished"
    );
    stats
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use chrono::Utc;
    use rust_decimal_macros::dec;
    use stockledger_core::{ProductId, TenantId};
    use stockledger_inventory::{Batch, MovementInput, MovementType};

    use super::*;
    use crate::catalog::ProductSnapshot;
    use crate::config::EngineConfig;

    #[test]
    fn sweeper_picks_up_expiring_batches_and_stops_on_shutdown() {
        let (engine, catalog) = StockEngine::in_memory(EngineConfig::default());
        let engine = Arc::new(engine);
        let tenant = TenantId::new();
        let product_id = ProductId::new();
        catalog.upsert_product(
            tenant,
            ProductSnapshot {
                product_id,
                sku: "MILK".to_string(),
                cost_price: dec!(1),
                max_stock_level: None,
            },
        );
        engine
            .create_movement(
                tenant,
                MovementInput::new(product_id, None, MovementType::Inbound, 50, dec!(1)),
            )
            .unwrap();
        catalog.upsert_batch(
            tenant,
            Batch {
                product_id,
                location_id: None,
                batch_number: "L-1".to_string(),
                quantity: 50,
                expiry_date: Utc::now().date_naive(),
            },
        );

        let handle = ThresholdSweep::spawn(engine.clone(), Duration::from_millis(20)).unwrap();
        let deadline = Instant::now() + Duration::from_secs(2);
        while handle.stats().runs == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        let stats = handle.stats();
        handle.shutdown();

        assert!(stats.runs >= 1);
        assert_eq!(stats.alerts_created, 1);
        assert_eq!(engine.list_alerts(tenant, None).unwrap().len(), 1);
    }

    #[test]
    fn companies_with_batches_but_no_movements_are_swept() {
        let (engine, catalog) = StockEngine::in_memory(EngineConfig::default());
        let tenant = TenantId::new();
        let product_id = ProductId::new();
        catalog.upsert_product(
            tenant,
            ProductSnapshot {
                product_id,
                sku: "YOGURT".to_string(),
                cost_price: dec!(1),
                max_stock_level: None,
            },
        );
        catalog.upsert_batch(
            tenant,
            Batch {
                product_id,
                location_id: None,
                batch_number: "L-9".to_string(),
                quantity: 12,
                expiry_date: Utc::now().date_naive() - chrono::Days::new(1),
            },
        );

        assert_eq!(engine.companies().unwrap(), vec![tenant]);
        let run = sweep_once(&engine);
        assert_eq!(run.alerts_created, 1);
        assert_eq!(run.failures, 0);
        assert_eq!(engine.list_alerts(tenant, None).unwrap().len(), 1);
    }
}
