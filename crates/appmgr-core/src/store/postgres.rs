// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! PostgreSQL-backed state store.
//!
//! Statuses and events are stored as their wire strings. Chart references and
//! values overrides are JSONB. Guarded updates are a single
//! `UPDATE ... WHERE id = $1 AND status = ANY($2)` statement, so the status
//! check and the write cannot interleave with another writer.

use appmgr_protocol::{
    AppStatus, ChartDetail, ClusterStatus, CustomValue, HeartbeatMetrics, NamespaceStatus,
    ResourceQuantity,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::{
    AppFilter, AppRecord, AppUpdate, ClusterConnectionRecord, NamespaceFilter, NamespaceRecord,
    NamespaceUpdate, StateStore,
};
use crate::error::{CoreError, Result};

/// PostgreSQL-backed state store.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new Postgres-backed store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

// ============================================================================
// Row Types
// ============================================================================

const NAMESPACE_COLUMNS: &str = "id, name, name_updating, team_id, creator, cluster_id, \
     cluster_name, cpu_limit, mem_limit, storage_limit, cpu_limit_updating, \
     mem_limit_updating, storage_limit_updating, cpu_usage, mem_usage, storage_usage, \
     status, event, hidden, created_at, last_modified";

const APP_COLUMNS: &str = "id, name, team_id, creator, namespace_id, chart, chart_updating, \
     custom_values, custom_values_updating, status, event, detail, report, node_ports, \
     gateway_addr, hidden, created_at, last_modified";

const CLUSTER_COLUMNS: &str = "id, status, metrics, created_at, last_modified";

#[derive(sqlx::FromRow)]
struct NamespaceRow {
    id: String,
    name: String,
    name_updating: Option<String>,
    team_id: String,
    creator: String,
    cluster_id: String,
    cluster_name: String,
    cpu_limit: i64,
    mem_limit: i64,
    storage_limit: i64,
    cpu_limit_updating: Option<i64>,
    mem_limit_updating: Option<i64>,
    storage_limit_updating: Option<i64>,
    cpu_usage: i64,
    mem_usage: i64,
    storage_usage: i64,
    status: String,
    event: String,
    hidden: bool,
    created_at: DateTime<Utc>,
    last_modified: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct AppRow {
    id: String,
    name: String,
    team_id: String,
    creator: String,
    namespace_id: String,
    chart: Json<ChartDetail>,
    chart_updating: Option<Json<ChartDetail>>,
    custom_values: Json<Vec<CustomValue>>,
    custom_values_updating: Option<Json<Vec<CustomValue>>>,
    status: String,
    event: String,
    detail: String,
    report: String,
    node_ports: String,
    gateway_addr: String,
    hidden: bool,
    created_at: DateTime<Utc>,
    last_modified: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct ClusterRow {
    id: String,
    status: String,
    metrics: Option<Json<HeartbeatMetrics>>,
    created_at: DateTime<Utc>,
    last_modified: DateTime<Utc>,
}

fn to_u32(field: &str, value: i64) -> Result<u32> {
    u32::try_from(value).map_err(|_| CoreError::InvalidRecord {
        field: field.to_string(),
        message: format!("{} is out of range", value),
    })
}

fn quantity(cpu: i64, mem: i64, storage: i64) -> Result<ResourceQuantity> {
    Ok(ResourceQuantity {
        cpu: to_u32("cpu", cpu)?,
        mem: to_u32("mem", mem)?,
        storage: to_u32("storage", storage)?,
    })
}

impl TryFrom<NamespaceRow> for NamespaceRecord {
    type Error = CoreError;

    fn try_from(row: NamespaceRow) -> Result<Self> {
        let limits_updating = match (
            row.cpu_limit_updating,
            row.mem_limit_updating,
            row.storage_limit_updating,
        ) {
            (Some(cpu), Some(mem), Some(storage)) => Some(quantity(cpu, mem, storage)?),
            _ => None,
        };
        Ok(NamespaceRecord {
            id: row.id,
            name: row.name,
            name_updating: row.name_updating,
            team_id: row.team_id,
            creator: row.creator,
            cluster_id: row.cluster_id,
            cluster_name: row.cluster_name,
            limits: quantity(row.cpu_limit, row.mem_limit, row.storage_limit)?,
            limits_updating,
            usage: quantity(row.cpu_usage, row.mem_usage, row.storage_usage)?,
            status: row.status.parse()?,
            event: row.event.parse()?,
            hidden: row.hidden,
            created_at: row.created_at,
            last_modified: row.last_modified,
        })
    }
}

impl TryFrom<AppRow> for AppRecord {
    type Error = CoreError;

    fn try_from(row: AppRow) -> Result<Self> {
        Ok(AppRecord {
            id: row.id,
            name: row.name,
            team_id: row.team_id,
            creator: row.creator,
            namespace_id: row.namespace_id,
            chart: row.chart.0,
            chart_updating: row.chart_updating.map(|c| c.0),
            custom_values: row.custom_values.0,
            custom_values_updating: row.custom_values_updating.map(|v| v.0),
            status: row.status.parse()?,
            event: row.event.parse()?,
            detail: row.detail,
            report: row.report,
            node_ports: row.node_ports,
            gateway_addr: row.gateway_addr,
            hidden: row.hidden,
            created_at: row.created_at,
            last_modified: row.last_modified,
        })
    }
}

impl TryFrom<ClusterRow> for ClusterConnectionRecord {
    type Error = CoreError;

    fn try_from(row: ClusterRow) -> Result<Self> {
        Ok(ClusterConnectionRecord {
            id: row.id,
            status: row.status.parse()?,
            metrics: row.metrics.map(|m| m.0),
            created_at: row.created_at,
            last_modified: row.last_modified,
        })
    }
}

fn map_insert_error(err: sqlx::Error, kind: &'static str, id: &str) -> CoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => CoreError::RecordAlreadyExists {
            kind,
            id: id.to_string(),
        },
        _ => CoreError::DatabaseError {
            operation: format!("insert {}", kind),
            details: err.to_string(),
        },
    }
}

fn status_strings<S: ToString>(statuses: &[S]) -> Vec<String> {
    statuses.iter().map(|s| s.to_string()).collect()
}

// ============================================================================
// Query Builders
// ============================================================================

fn push_namespace_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &NamespaceFilter) {
    qb.push(" WHERE TRUE");
    if !filter.include_hidden {
        qb.push(" AND hidden = FALSE");
    }
    if let Some(team_id) = &filter.team_id {
        qb.push(" AND team_id = ").push_bind(team_id.clone());
    }
    if let Some(cluster_id) = &filter.cluster_id {
        qb.push(" AND cluster_id = ").push_bind(cluster_id.clone());
    }
    if let Some(statuses) = &filter.statuses {
        qb.push(" AND status = ANY(")
            .push_bind(status_strings(statuses))
            .push(")");
    }
}

fn push_app_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &AppFilter) {
    qb.push(" WHERE TRUE");
    if !filter.include_hidden {
        qb.push(" AND hidden = FALSE");
    }
    if let Some(team_id) = &filter.team_id {
        qb.push(" AND team_id = ").push_bind(team_id.clone());
    }
    if let Some(namespace_id) = &filter.namespace_id {
        qb.push(" AND namespace_id = ").push_bind(namespace_id.clone());
    }
    if let Some(statuses) = &filter.statuses {
        qb.push(" AND status = ANY(")
            .push_bind(status_strings(statuses))
            .push(")");
    }
}

fn namespace_update_query(update: NamespaceUpdate) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("UPDATE namespaces SET last_modified = ");
    qb.push_bind(update.last_modified.unwrap_or_else(Utc::now));
    if let Some(name) = update.name {
        qb.push(", name = ").push_bind(name);
    }
    if let Some(name_updating) = update.name_updating {
        qb.push(", name_updating = ").push_bind(name_updating);
    }
    if let Some(cluster_id) = update.cluster_id {
        qb.push(", cluster_id = ").push_bind(cluster_id);
    }
    if let Some(cluster_name) = update.cluster_name {
        qb.push(", cluster_name = ").push_bind(cluster_name);
    }
    if let Some(limits) = update.limits {
        qb.push(", cpu_limit = ").push_bind(i64::from(limits.cpu));
        qb.push(", mem_limit = ").push_bind(i64::from(limits.mem));
        qb.push(", storage_limit = ").push_bind(i64::from(limits.storage));
    }
    if let Some(limits_updating) = update.limits_updating {
        qb.push(", cpu_limit_updating = ")
            .push_bind(limits_updating.map(|l| i64::from(l.cpu)));
        qb.push(", mem_limit_updating = ")
            .push_bind(limits_updating.map(|l| i64::from(l.mem)));
        qb.push(", storage_limit_updating = ")
            .push_bind(limits_updating.map(|l| i64::from(l.storage)));
    }
    if let Some(usage) = update.usage {
        qb.push(", cpu_usage = ").push_bind(i64::from(usage.cpu));
        qb.push(", mem_usage = ").push_bind(i64::from(usage.mem));
        qb.push(", storage_usage = ").push_bind(i64::from(usage.storage));
    }
    if let Some(status) = update.status {
        qb.push(", status = ").push_bind(status.as_str());
    }
    if let Some(event) = update.event {
        qb.push(", event = ").push_bind(event.as_str());
    }
    if let Some(hidden) = update.hidden {
        qb.push(", hidden = ").push_bind(hidden);
    }
    qb
}

fn app_update_query(update: AppUpdate) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("UPDATE apps SET last_modified = ");
    qb.push_bind(update.last_modified.unwrap_or_else(Utc::now));
    if let Some(name) = update.name {
        qb.push(", name = ").push_bind(name);
    }
    if let Some(chart) = update.chart {
        qb.push(", chart = ").push_bind(Json(chart));
    }
    if let Some(chart_updating) = update.chart_updating {
        qb.push(", chart_updating = ")
            .push_bind(chart_updating.map(Json));
    }
    if let Some(custom_values) = update.custom_values {
        qb.push(", custom_values = ").push_bind(Json(custom_values));
    }
    if let Some(custom_values_updating) = update.custom_values_updating {
        qb.push(", custom_values_updating = ")
            .push_bind(custom_values_updating.map(Json));
    }
    if let Some(status) = update.status {
        qb.push(", status = ").push_bind(status.as_str());
    }
    if let Some(event) = update.event {
        qb.push(", event = ").push_bind(event.as_str());
    }
    if let Some(detail) = update.detail {
        qb.push(", detail = ").push_bind(detail);
    }
    if let Some(report) = update.report {
        qb.push(", report = ").push_bind(report);
    }
    if let Some(node_ports) = update.node_ports {
        qb.push(", node_ports = ").push_bind(node_ports);
    }
    if let Some(gateway_addr) = update.gateway_addr {
        qb.push(", gateway_addr = ").push_bind(gateway_addr);
    }
    if let Some(hidden) = update.hidden {
        qb.push(", hidden = ").push_bind(hidden);
    }
    qb
}

// ============================================================================
// Namespace Operations
// ============================================================================

/// Fetch a namespace by id.
pub async fn get_namespace(pool: &PgPool, id: &str) -> Result<Option<NamespaceRecord>> {
    let sql = format!("SELECT {} FROM namespaces WHERE id = $1", NAMESPACE_COLUMNS);
    let row = sqlx::query_as::<_, NamespaceRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    row.map(NamespaceRecord::try_from).transpose()
}

/// List namespaces matching `filter`.
pub async fn list_namespaces(
    pool: &PgPool,
    filter: &NamespaceFilter,
) -> Result<Vec<NamespaceRecord>> {
    let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM namespaces", NAMESPACE_COLUMNS));
    push_namespace_filter(&mut qb, filter);
    qb.push(" ORDER BY created_at, id");
    let rows = qb.build_query_as::<NamespaceRow>().fetch_all(pool).await?;
    rows.into_iter().map(NamespaceRecord::try_from).collect()
}

/// Insert a namespace.
pub async fn insert_namespace(pool: &PgPool, record: &NamespaceRecord) -> Result<()> {
    let limits_updating = record.limits_updating;
    sqlx::query(
        r#"
        INSERT INTO namespaces (
            id, name, name_updating, team_id, creator, cluster_id, cluster_name,
            cpu_limit, mem_limit, storage_limit,
            cpu_limit_updating, mem_limit_updating, storage_limit_updating,
            cpu_usage, mem_usage, storage_usage,
            status, event, hidden, created_at, last_modified
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                $17, $18, $19, $20, $21)
        "#,
    )
    .bind(&record.id)
    .bind(&record.name)
    .bind(&record.name_updating)
    .bind(&record.team_id)
    .bind(&record.creator)
    .bind(&record.cluster_id)
    .bind(&record.cluster_name)
    .bind(i64::from(record.limits.cpu))
    .bind(i64::from(record.limits.mem))
    .bind(i64::from(record.limits.storage))
    .bind(limits_updating.map(|l| i64::from(l.cpu)))
    .bind(limits_updating.map(|l| i64::from(l.mem)))
    .bind(limits_updating.map(|l| i64::from(l.storage)))
    .bind(i64::from(record.usage.cpu))
    .bind(i64::from(record.usage.mem))
    .bind(i64::from(record.usage.storage))
    .bind(record.status.as_str())
    .bind(record.event.as_str())
    .bind(record.hidden)
    .bind(record.created_at)
    .bind(record.last_modified)
    .execute(pool)
    .await
    .map_err(|e| map_insert_error(e, "namespace", &record.id))?;

    Ok(())
}

/// Apply a namespace update, optionally guarded by status. Returns rows changed.
pub async fn update_namespace(
    pool: &PgPool,
    id: &str,
    expected: Option<&[NamespaceStatus]>,
    update: NamespaceUpdate,
) -> Result<u64> {
    let mut qb = namespace_update_query(update);
    qb.push(" WHERE id = ").push_bind(id.to_string());
    if let Some(expected) = expected {
        qb.push(" AND status = ANY(")
            .push_bind(status_strings(expected))
            .push(")");
    }
    let result = qb.build().execute(pool).await?;
    Ok(result.rows_affected())
}

// ============================================================================
// App Operations
// ============================================================================

/// Fetch an app by id.
pub async fn get_app(pool: &PgPool, id: &str) -> Result<Option<AppRecord>> {
    let sql = format!("SELECT {} FROM apps WHERE id = $1", APP_COLUMNS);
    let row = sqlx::query_as::<_, AppRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    row.map(AppRecord::try_from).transpose()
}

/// List apps matching `filter`.
pub async fn list_apps(pool: &PgPool, filter: &AppFilter) -> Result<Vec<AppRecord>> {
    let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM apps", APP_COLUMNS));
    push_app_filter(&mut qb, filter);
    qb.push(" ORDER BY created_at, id");
    let rows = qb.build_query_as::<AppRow>().fetch_all(pool).await?;
    rows.into_iter().map(AppRecord::try_from).collect()
}

/// Insert an app.
pub async fn insert_app(pool: &PgPool, record: &AppRecord) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO apps (
            id, name, team_id, creator, namespace_id,
            chart, chart_updating, custom_values, custom_values_updating,
            status, event, detail, report, node_ports, gateway_addr,
            hidden, created_at, last_modified
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
        "#,
    )
    .bind(&record.id)
    .bind(&record.name)
    .bind(&record.team_id)
    .bind(&record.creator)
    .bind(&record.namespace_id)
    .bind(Json(&record.chart))
    .bind(record.chart_updating.as_ref().map(Json))
    .bind(Json(&record.custom_values))
    .bind(record.custom_values_updating.as_ref().map(Json))
    .bind(record.status.as_str())
    .bind(record.event.as_str())
    .bind(&record.detail)
    .bind(&record.report)
    .bind(&record.node_ports)
    .bind(&record.gateway_addr)
    .bind(record.hidden)
    .bind(record.created_at)
    .bind(record.last_modified)
    .execute(pool)
    .await
    .map_err(|e| map_insert_error(e, "app", &record.id))?;

    Ok(())
}

/// Apply an app update to a single id, optionally guarded by status.
pub async fn update_app(
    pool: &PgPool,
    id: &str,
    expected: Option<&[AppStatus]>,
    update: AppUpdate,
) -> Result<u64> {
    let mut qb = app_update_query(update);
    qb.push(" WHERE id = ").push_bind(id.to_string());
    if let Some(expected) = expected {
        qb.push(" AND status = ANY(")
            .push_bind(status_strings(expected))
            .push(")");
    }
    let result = qb.build().execute(pool).await?;
    Ok(result.rows_affected())
}

/// Apply an app update to every row matching `filter`.
pub async fn update_apps_where(pool: &PgPool, filter: &AppFilter, update: AppUpdate) -> Result<u64> {
    let mut qb = app_update_query(update);
    push_app_filter(&mut qb, filter);
    let result = qb.build().execute(pool).await?;
    Ok(result.rows_affected())
}

// ============================================================================
// Cluster Operations
// ============================================================================

/// Fetch a cluster connection by id.
pub async fn get_cluster(pool: &PgPool, id: &str) -> Result<Option<ClusterConnectionRecord>> {
    let sql = format!("SELECT {} FROM cluster_connections WHERE id = $1", CLUSTER_COLUMNS);
    let row = sqlx::query_as::<_, ClusterRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    row.map(ClusterConnectionRecord::try_from).transpose()
}

/// List all cluster connections.
pub async fn list_clusters(pool: &PgPool) -> Result<Vec<ClusterConnectionRecord>> {
    let sql = format!("SELECT {} FROM cluster_connections ORDER BY id", CLUSTER_COLUMNS);
    let rows = sqlx::query_as::<_, ClusterRow>(&sql).fetch_all(pool).await?;
    rows.into_iter().map(ClusterConnectionRecord::try_from).collect()
}

/// Create or update a cluster connection, keeping stored metrics when none are given.
pub async fn upsert_cluster(
    pool: &PgPool,
    id: &str,
    status: ClusterStatus,
    metrics: Option<HeartbeatMetrics>,
) -> Result<ClusterConnectionRecord> {
    let sql = format!(
        r#"
        INSERT INTO cluster_connections (id, status, metrics, created_at, last_modified)
        VALUES ($1, $2, $3, NOW(), NOW())
        ON CONFLICT (id) DO UPDATE
        SET status = EXCLUDED.status,
            metrics = COALESCE(EXCLUDED.metrics, cluster_connections.metrics),
            last_modified = NOW()
        RETURNING {}
        "#,
        CLUSTER_COLUMNS
    );
    let row = sqlx::query_as::<_, ClusterRow>(&sql)
        .bind(id)
        .bind(status.as_str())
        .bind(metrics.map(Json))
        .fetch_one(pool)
        .await?;
    ClusterConnectionRecord::try_from(row)
}

// ============================================================================
// Trait Implementation
// ============================================================================

#[async_trait]
impl StateStore for PostgresStore {
    async fn get_namespace(&self, id: &str) -> Result<Option<NamespaceRecord>> {
        get_namespace(&self.pool, id).await
    }

    async fn list_namespaces(&self, filter: &NamespaceFilter) -> Result<Vec<NamespaceRecord>> {
        list_namespaces(&self.pool, filter).await
    }

    async fn insert_namespace(&self, record: &NamespaceRecord) -> Result<()> {
        insert_namespace(&self.pool, record).await
    }

    async fn update_namespace(&self, id: &str, update: NamespaceUpdate) -> Result<()> {
        match update_namespace(&self.pool, id, None, update).await? {
            0 => Err(CoreError::not_found("namespace", id)),
            _ => Ok(()),
        }
    }

    async fn update_namespace_if(
        &self,
        id: &str,
        expected: &[NamespaceStatus],
        update: NamespaceUpdate,
    ) -> Result<bool> {
        Ok(update_namespace(&self.pool, id, Some(expected), update).await? > 0)
    }

    async fn get_app(&self, id: &str) -> Result<Option<AppRecord>> {
        get_app(&self.pool, id).await
    }

    async fn list_apps(&self, filter: &AppFilter) -> Result<Vec<AppRecord>> {
        list_apps(&self.pool, filter).await
    }

    async fn insert_app(&self, record: &AppRecord) -> Result<()> {
        insert_app(&self.pool, record).await
    }

    async fn update_app(&self, id: &str, update: AppUpdate) -> Result<()> {
        match update_app(&self.pool, id, None, update).await? {
            0 => Err(CoreError::not_found("app", id)),
            _ => Ok(()),
        }
    }

    async fn update_app_if(
        &self,
        id: &str,
        expected: &[AppStatus],
        update: AppUpdate,
    ) -> Result<bool> {
        Ok(update_app(&self.pool, id, Some(expected), update).await? > 0)
    }

    async fn update_apps_where(&self, filter: &AppFilter, update: AppUpdate) -> Result<u64> {
        update_apps_where(&self.pool, filter, update).await
    }

    async fn get_cluster(&self, id: &str) -> Result<Option<ClusterConnectionRecord>> {
        get_cluster(&self.pool, id).await
    }

    async fn list_clusters(&self) -> Result<Vec<ClusterConnectionRecord>> {
        list_clusters(&self.pool).await
    }

    async fn upsert_cluster(
        &self,
        id: &str,
        status: ClusterStatus,
        metrics: Option<HeartbeatMetrics>,
    ) -> Result<ClusterConnectionRecord> {
        upsert_cluster(&self.pool, id, status, metrics).await
    }
}
