//! Metering engine
//!
//! Runs one tick: load the window snapshot, decide between a measurement and
//! a reset tick, then either count host sightings or publish the closed
//! window. Any tenant error aborts the tick with nothing further persisted.

use crate::client::{HttpTenantApi, TenantApi};
use crate::config::MeterConfig;
use crate::directory::EntityDirectory;
use crate::ingest::{ddu_lines, dem_lines, host_unit_groups, EmitSummary, LineEmitter, Stream};
use crate::metering::{ddu_consumption, dem_consumption, observe_hosts};
use crate::telemetry::EngineMetrics;
use crate::window::{plan_window, CacheSnapshot, SnapshotStore, TickKind, WindowPlan};
use crate::zones::{sync_zone_rules, ZoneSyncReport};

use chrono::{DateTime, TimeZone};
use licmeter_common::Result;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

/// What one tick did
#[derive(Debug)]
pub struct TickReport {
    pub tick_id: Uuid,
    pub plan: WindowPlan,
    /// Hosts in the snapshot after the tick
    pub hosts_tracked: usize,
    pub host_units: EmitSummary,
    pub dem_rum: EmitSummary,
    pub dem_synthetic: EmitSummary,
    pub ddu: EmitSummary,
    pub zones: Option<ZoneSyncReport>,
}

impl TickReport {
    fn new(tick_id: Uuid, plan: WindowPlan) -> Self {
        Self {
            tick_id,
            plan,
            hosts_tracked: 0,
            host_units: EmitSummary::default(),
            dem_rum: EmitSummary::default(),
            dem_synthetic: EmitSummary::default(),
            ddu: EmitSummary::default(),
            zones: None,
        }
    }
}

/// Consumption metering engine for one tenant endpoint
pub struct MeteringEngine {
    config: MeterConfig,
    api: Arc<dyn TenantApi>,
    metrics: Arc<EngineMetrics>,
    store: SnapshotStore,
}

impl MeteringEngine {
    pub fn new(config: MeterConfig, api: Arc<dyn TenantApi>, metrics: Arc<EngineMetrics>) -> Self {
        let store = SnapshotStore::new(config.cache_path());
        Self {
            config,
            api,
            metrics,
            store,
        }
    }

    /// Engine talking to the configured tenant over HTTPS
    pub fn from_config(config: MeterConfig) -> Result<Self> {
        let metrics = Arc::new(EngineMetrics::new()?);
        let api = Arc::new(HttpTenantApi::new(&config, metrics.clone())?);
        Ok(Self::new(config, api, metrics))
    }

    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    pub fn config(&self) -> &MeterConfig {
        &self.config
    }

    /// Run one tick at wall-clock `now`
    pub async fn run_tick<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Result<TickReport> {
        let started = Instant::now();
        let tick_id = Uuid::new_v4();
        let now_millis = now.timestamp_millis();

        let span = info_span!("tick", %tick_id, endpoint = %self.config.endpoint_name);
        self.tick(tick_id, now, now_millis, started)
            .instrument(span)
            .await
    }

    async fn tick<Tz: TimeZone>(
        &self,
        tick_id: Uuid,
        now: &DateTime<Tz>,
        now_millis: i64,
        started: Instant,
    ) -> Result<TickReport> {
        let snapshot = self.store.load(now_millis).await;
        let plan = plan_window(now, snapshot.last_millis);
        info!(
            now_millis = plan.now_millis,
            last_millis = plan.last_reset_millis,
            elapsed_ms = plan.elapsed_ms,
            kind = plan.kind.as_str(),
            "Planned tick"
        );

        let report = match plan.kind {
            TickKind::Measure => self.measure(tick_id, plan, snapshot).await?,
            TickKind::Reset => self.reset(tick_id, plan, snapshot, started).await?,
        };

        self.metrics
            .ticks_total
            .with_label_values(&[plan.kind.as_str()])
            .inc();
        Ok(report)
    }

    async fn measure(
        &self,
        tick_id: Uuid,
        plan: WindowPlan,
        mut snapshot: CacheSnapshot,
    ) -> Result<TickReport> {
        snapshot.last_millis = plan.last_reset_millis;
        if self.config.families.host_units {
            info!("Getting hosts and checking host unit hours");
            observe_hosts(self.api.as_ref(), &mut snapshot.hosts).await?;
        }
        self.store.store(&snapshot).await?;

        let mut report = TickReport::new(tick_id, plan);
        report.hosts_tracked = snapshot.hosts.len();
        Ok(report)
    }

    async fn reset(
        &self,
        tick_id: Uuid,
        plan: WindowPlan,
        mut snapshot: CacheSnapshot,
        started: Instant,
    ) -> Result<TickReport> {
        let closed = snapshot.reset(plan.now_millis);
        self.store.store(&snapshot).await?;

        let mut report = TickReport::new(tick_id, plan);
        let families = self.config.families;
        let api = self.api.as_ref();
        let emitter = LineEmitter::new(api, &self.metrics);
        let mut directory =
            EntityDirectory::started_at(started, plan.inventory_from(), self.config.attribution_budget);

        if families.application_usage {
            info!("Calculating DEM");
            let dem = dem_consumption(api, &mut directory, &plan).await?;
            report.dem_rum = emitter
                .emit(
                    Stream::DemRum,
                    dem_lines("consumption.DEM.RUM", "application", &dem.rum, &directory),
                )
                .await?;
            report.dem_synthetic = emitter
                .emit(
                    Stream::DemSynthetic,
                    dem_lines("consumption.DEM.Synthetic", "test", &dem.synthetic, &directory),
                )
                .await?;
        }

        if families.zone_usage {
            info!("Calculating DDU");
            let ddu = ddu_consumption(api, &mut directory, &closed, &plan).await?;
            report.ddu = emitter.emit(Stream::Ddu, ddu_lines(&ddu)).await?;
        }

        if families.host_units {
            info!(hosts = closed.len(), "Pushing host units and host unit hours");
            report.host_units = emitter
                .emit_grouped(Stream::HostUnits, host_unit_groups(&closed))
                .await?;
        }

        if families.zone_usage {
            info!("Checking management zone rules");
            let zones = sync_zone_rules(
                self.api.clone(),
                &self.metrics,
                self.config.zone_sync_concurrency,
            )
            .await?;
            report.zones = Some(zones);
        }

        // first sightings of the new window
        if families.host_units {
            observe_hosts(api, &mut snapshot.hosts).await?;
            self.store.store(&snapshot).await?;
        }

        report.hosts_tracked = snapshot.hosts.len();
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{HostProperties, RawEntity};
    use crate::testing::{entity, MemoryTenant};
    use chrono::Utc;
    use licmeter_common::{HostRecord, ManagementZone, TagMap, DAY_MS, HOUR_MS};
    use serde_json::json;

    const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

    fn engine(tenant: &Arc<MemoryTenant>, dir: &tempfile::TempDir) -> MeteringEngine {
        let mut config = MeterConfig::new("token", "https://tenant.example.com", "prod-eu").unwrap();
        config.cache_dir = dir.path().to_path_buf();
        let metrics = Arc::new(EngineMetrics::new().unwrap());
        MeteringEngine::new(config, tenant.clone(), metrics)
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, h, m, 0).unwrap()
    }

    fn listed_host(id: &str, gib: f64) -> RawEntity {
        RawEntity {
            properties: HostProperties {
                memory_total: Some(gib * GIB),
                ..Default::default()
            },
            ..entity(id, id, &[("1", "Prod")], &[])
        }
    }

    fn tracked(seen: u32, hu: f64) -> HostRecord {
        let mut tags = TagMap::new();
        tags.insert("env".into(), "prod".into());
        HostRecord {
            seen,
            hu,
            tags,
            mz: vec![ManagementZone::named("1", "Prod")],
            name: "host".into(),
        }
    }

    async fn seed(engine: &MeteringEngine, snapshot: &CacheSnapshot) {
        SnapshotStore::new(engine.config().cache_path())
            .store(snapshot)
            .await
            .unwrap();
    }

    async fn stored(engine: &MeteringEngine) -> CacheSnapshot {
        SnapshotStore::new(engine.config().cache_path())
            .load(at(12, 0).timestamp_millis())
            .await
    }

    #[tokio::test]
    async fn test_measurement_tick_counts_sightings() {
        let dir = tempfile::tempdir().unwrap();
        let tenant = Arc::new(MemoryTenant::new());
        tenant.add_entities("HOST", vec![listed_host("HOST-1", 20.0)]);
        let engine = engine(&tenant, &dir);

        let now = at(10, 30);
        let last = at(10, 0).timestamp_millis();
        let mut snapshot = CacheSnapshot::fresh(last);
        snapshot.hosts.insert("HOST-1".into(), tracked(2, 2.0));
        seed(&engine, &snapshot).await;

        let report = engine.run_tick(&now).await.unwrap();
        assert_eq!(report.plan.kind, TickKind::Measure);
        assert_eq!(report.hosts_tracked, 1);

        let after = stored(&engine).await;
        assert_eq!(after.last_millis, last);
        assert_eq!(after.hosts["HOST-1"].seen, 3);
        assert!(tenant.ingested().is_empty());
        assert!(tenant.metric_queries().is_empty());
        assert_eq!(engine.metrics().ticks_total.with_label_values(&["measure"]).get(), 1);
    }

    #[tokio::test]
    async fn test_first_run_starts_window() {
        let dir = tempfile::tempdir().unwrap();
        let tenant = Arc::new(MemoryTenant::new());
        let engine = engine(&tenant, &dir);

        let now = at(11, 0);
        let report = engine.run_tick(&now).await.unwrap();
        assert_eq!(report.plan.kind, TickKind::Measure);
        assert_eq!(stored(&engine).await.last_millis, now.timestamp_millis());
    }

    #[tokio::test]
    async fn test_reset_tick_publishes_window() {
        let dir = tempfile::tempdir().unwrap();
        let tenant = Arc::new(MemoryTenant::new());
        tenant.add_entities("HOST", vec![listed_host("HOST-3", 4.0)]);
        tenant.add_entities(
            "APPLICATION",
            vec![entity("APPLICATION-1", "shop", &[("1", "Prod")], &[])],
        );
        tenant.set_metric(
            "builtin:billing.apps.web.sessionsWithReplayByApplication",
            vec![(vec!["APPLICATION-1", "Billed"], vec![Some(2.0)])],
        );
        tenant.set_metric(
            "builtin:billing.ddu.metrics.byEntity",
            vec![(vec!["HOST-1"], vec![Some(3.0)])],
        );
        tenant.add_zone("1", "Prod", json!({"name": "Prod"}));
        let engine = engine(&tenant, &dir);

        let now = at(10, 0);
        let mut snapshot = CacheSnapshot::fresh(now.timestamp_millis() - HOUR_MS);
        snapshot.hosts.insert("HOST-1".into(), tracked(5, 2.0));
        snapshot.hosts.insert("HOST-2".into(), tracked(4, 0.5));
        seed(&engine, &snapshot).await;

        let report = engine.run_tick(&now).await.unwrap();
        assert_eq!(report.plan.kind, TickKind::Reset);

        let lines = tenant.ingested_lines();
        assert_eq!(
            lines,
            vec![
                "consumption.DEM.RUM,application=\"shop\" 2",
                "consumption.DEM.RUM,application=\"all\" 2",
                "consumption.DDU,management_zone=\"Prod\" 3",
                "consumption.DDU,management_zone=\"all\" 3",
                "consumption.hostUnit,dt.entity.host=HOST-1,env=\"prod\" 2",
                "consumption.hostUnitHours,dt.entity.host=HOST-1,env=\"prod\" 2",
                "consumption.hostUnit,dt.entity.host=HOST-2,env=\"prod\" 0.5",
            ]
        );
        assert_eq!(report.dem_synthetic.batches, 0);
        assert_eq!(report.zones.as_ref().unwrap().added, vec!["Prod".to_string()]);
        assert_eq!(tenant.put_count(), 1);

        let after = stored(&engine).await;
        assert_eq!(after.last_millis, now.timestamp_millis());
        assert_eq!(after.hosts.len(), 1);
        assert_eq!(after.hosts["HOST-3"].seen, 1);
        assert_eq!(engine.metrics().ticks_total.with_label_values(&["reset"]).get(), 1);
    }

    #[tokio::test]
    async fn test_stale_snapshot_window_capped() {
        let dir = tempfile::tempdir().unwrap();
        let tenant = Arc::new(MemoryTenant::new());
        let engine = engine(&tenant, &dir);

        let now = at(10, 0);
        seed(&engine, &CacheSnapshot::fresh(now.timestamp_millis() - 3 * DAY_MS)).await;

        let report = engine.run_tick(&now).await.unwrap();
        assert_eq!(report.plan.kind, TickKind::Reset);
        assert_eq!(report.plan.elapsed_ms, DAY_MS);

        let dem_from = now.timestamp_millis() - DAY_MS - HOUR_MS;
        assert!(tenant
            .metric_queries()
            .iter()
            .filter(|(selector, _, _)| selector.starts_with("builtin:billing.apps"))
            .all(|(_, from, _)| *from == dem_from));
    }

    #[tokio::test]
    async fn test_out_of_range_snapshot_starts_fresh_window() {
        let dir = tempfile::tempdir().unwrap();
        let tenant = Arc::new(MemoryTenant::new());
        let engine = engine(&tenant, &dir);
        let now = at(10, 0);

        for last in [i64::MIN, now.timestamp_millis() + 365 * DAY_MS] {
            let json = format!(r#"{{"last_millis": {}, "hosts": {{"HOST-1": {{"seen": 40}}}}}}"#, last);
            tokio::fs::write(engine.config().cache_path(), json).await.unwrap();

            let report = engine.run_tick(&now).await.unwrap();
            assert_eq!(report.plan.kind, TickKind::Measure);
            assert_eq!(report.plan.elapsed_ms, 0);
            assert_eq!(report.hosts_tracked, 0);
            assert_eq!(stored(&engine).await.last_millis, now.timestamp_millis());
        }
        assert!(tenant.ingested().is_empty());
    }

    #[tokio::test]
    async fn test_failed_push_aborts_after_clearing() {
        let dir = tempfile::tempdir().unwrap();
        let tenant = Arc::new(MemoryTenant::new());
        tenant.set_metric(
            "builtin:billing.ddu.metrics.byEntity",
            vec![(vec!["HOST-1"], vec![Some(3.0)])],
        );
        tenant.fail_ingest(500);
        let engine = engine(&tenant, &dir);

        let now = at(10, 0);
        let mut snapshot = CacheSnapshot::fresh(now.timestamp_millis() - HOUR_MS);
        snapshot.hosts.insert("HOST-1".into(), tracked(5, 2.0));
        seed(&engine, &snapshot).await;

        let err = engine.run_tick(&now).await.unwrap_err();
        assert!(err.is_retryable());

        let after = stored(&engine).await;
        assert_eq!(after.last_millis, now.timestamp_millis());
        assert!(after.hosts.is_empty());
        assert_eq!(engine.metrics().ticks_total.with_label_values(&["reset"]).get(), 0);
    }

    #[tokio::test]
    async fn test_disabled_families_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let tenant = Arc::new(MemoryTenant::new());
        tenant.add_zone("1", "Prod", json!({"name": "Prod"}));
        let mut engine = engine(&tenant, &dir);
        engine.config.families.application_usage = false;
        engine.config.families.zone_usage = false;

        let now = at(10, 0);
        let mut snapshot = CacheSnapshot::fresh(now.timestamp_millis() - HOUR_MS);
        snapshot.hosts.insert("HOST-1".into(), tracked(1, 1.0));
        seed(&engine, &snapshot).await;

        let report = engine.run_tick(&now).await.unwrap();
        assert!(report.zones.is_none());
        assert!(tenant.metric_queries().is_empty());
        assert_eq!(tenant.put_count(), 0);
        assert_eq!(
            tenant.ingested_lines(),
            vec!["consumption.hostUnit,dt.entity.host=HOST-1,env=\"prod\" 1"]
        );
    }
}
