use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::traits::BeliefStore;
use crate::registry::{AgentRecord, BeliefSnapshot};
use crate::types::{Specialty, WorkerId, WorkerState};

/// Durable belief store backed by Postgres. One row per project in
/// `beliefs`, one row per registered worker in `belief_agents`. Turn
/// advancement is a single atomic UPDATE, so concurrent supervisors on
/// separate connections still observe a strictly increasing counter.
pub struct PostgresBeliefStore {
    pool: PgPool,
    project_id: String,
}

impl PostgresBeliefStore {
    pub async fn connect(database_url: &str, project_id: impl Into<String>) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .context("failed to connect to Postgres")?;

        Ok(Self {
            pool,
            project_id: project_id.into(),
        })
    }

    pub fn from_pool(pool: PgPool, project_id: impl Into<String>) -> Self {
        Self {
            pool,
            project_id: project_id.into(),
        }
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::raw_sql(include_str!("../../migrations/V001__initial_schema.sql"))
            .execute(&self.pool)
            .await
            .context("failed to run migrations")?;
        Ok(())
    }

    /// Idempotent: an existing project row is left untouched.
    pub async fn create_project(&self, constraints: HashMap<String, Value>) -> Result<()> {
        sqlx::query(
            "INSERT INTO beliefs (project_id, constraints)
             VALUES ($1, $2)
             ON CONFLICT (project_id) DO NOTHING",
        )
        .bind(&self.project_id)
        .bind(Value::Object(constraints.into_iter().collect()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl BeliefStore for PostgresBeliefStore {
    async fn snapshot(&self) -> Result<Arc<BeliefSnapshot>> {
        let belief_row = sqlx::query(
            "SELECT constraints, phase, turn FROM beliefs WHERE project_id = $1",
        )
        .bind(&self.project_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| anyhow!("project '{}' not found", self.project_id))?;

        let constraints_json: Value = belief_row.get("constraints");
        let constraints: HashMap<String, Value> =
            serde_json::from_value(constraints_json).unwrap_or_default();
        let phase: String = belief_row.get("phase");
        let turn: i64 = belief_row.get("turn");

        let agent_rows = sqlx::query(
            "SELECT id, supervisor, specialty, state, predecessor, registered_turn, registered_at
             FROM belief_agents WHERE project_id = $1",
        )
        .bind(&self.project_id)
        .fetch_all(&self.pool)
        .await?;

        let mut agents = HashMap::new();
        for row in agent_rows {
            let id: Uuid = row.get("id");
            let state_text: String = row.get("state");
            let specialty_text: String = row.get("specialty");
            let registered_turn: i64 = row.get("registered_turn");
            let registered_at: DateTime<Utc> = row.get("registered_at");

            agents.insert(
                id,
                AgentRecord {
                    id,
                    supervisor: row.get("supervisor"),
                    specialty: Specialty::new(specialty_text),
                    state: state_text.parse()?,
                    predecessor: row.get::<Option<Uuid>, _>("predecessor"),
                    registered_turn: registered_turn as u64,
                    registered_at,
                },
            );
        }

        Ok(Arc::new(BeliefSnapshot {
            project_id: self.project_id.clone(),
            constraints,
            phase,
            turn: turn as u64,
            agents,
        }))
    }

    async fn advance_turn(&self, new_phase: &str) -> Result<u64> {
        let row = sqlx::query(
            "UPDATE beliefs SET turn = turn + 1, phase = $2
             WHERE project_id = $1
             RETURNING turn",
        )
        .bind(&self.project_id)
        .bind(new_phase)
        .fetch_one(&self.pool)
        .await?;

        let turn: i64 = row.get("turn");
        Ok(turn as u64)
    }

    async fn register_agent(&self, record: AgentRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO belief_agents
                 (id, project_id, supervisor, specialty, state, predecessor,
                  registered_turn, registered_at)
             VALUES ($1, $2, $3, $4, $5, $6,
                 (SELECT turn FROM beliefs WHERE project_id = $2), $7)",
        )
        .bind(record.id)
        .bind(&self.project_id)
        .bind(record.supervisor)
        .bind(record.specialty.as_str())
        .bind(record.state.as_str())
        .bind(record.predecessor)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_agent(&self, id: WorkerId, state: WorkerState) -> Result<()> {
        sqlx::query(
            "UPDATE belief_agents SET state = $3 WHERE id = $1 AND project_id = $2",
        )
        .bind(id)
        .bind(&self.project_id)
        .bind(state.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
