//! Tenant lookup and config seeding.

use super::Store;
use hybridflow_core::{config::TenantSeed, error::HybridflowError, tenant::Tenant};

type TenantRow = (
    i64,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
);

const TENANT_COLUMNS: &str =
    "id, instance_name, server_url, api_key, system_prompt, llm_provider";

fn into_tenant(row: TenantRow) -> Tenant {
    let (id, instance_name, server_url, api_key, system_prompt, llm_provider) = row;
    Tenant {
        id,
        instance_name,
        server_url,
        api_key,
        system_prompt,
        llm_provider,
    }
}

impl Store {
    /// Resolve a tenant by its gateway instance name.
    pub async fn find_tenant_by_instance(
        &self,
        instance_name: &str,
    ) -> Result<Option<Tenant>, HybridflowError> {
        let row: Option<TenantRow> = sqlx::query_as(&format!(
            "SELECT {TENANT_COLUMNS} FROM tenants WHERE instance_name = ?"
        ))
        .bind(instance_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| HybridflowError::Store(format!("tenant lookup failed: {e}")))?;

        Ok(row.map(into_tenant))
    }

    pub async fn list_tenants(&self) -> Result<Vec<Tenant>, HybridflowError> {
        let rows: Vec<TenantRow> = sqlx::query_as(&format!(
            "SELECT {TENANT_COLUMNS} FROM tenants ORDER BY instance_name"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| HybridflowError::Store(format!("list tenants failed: {e}")))?;

        Ok(rows.into_iter().map(into_tenant).collect())
    }

    /// Insert or update a tenant keyed by instance name.
    pub async fn upsert_tenant(&self, seed: &TenantSeed) -> Result<Tenant, HybridflowError> {
        let row: TenantRow = sqlx::query_as(&format!(
            "INSERT INTO tenants (instance_name, server_url, api_key, system_prompt, llm_provider) \
             VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT(instance_name) DO UPDATE SET \
                 server_url = excluded.server_url, \
                 api_key = excluded.api_key, \
                 system_prompt = excluded.system_prompt, \
                 llm_provider = excluded.llm_provider, \
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') \
             RETURNING {TENANT_COLUMNS}"
        ))
        .bind(&seed.instance_name)
        .bind(&seed.server_url)
        .bind(&seed.api_key)
        .bind(&seed.system_prompt)
        .bind(&seed.llm_provider)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| HybridflowError::Store(format!("upsert tenant failed: {e}")))?;

        Ok(into_tenant(row))
    }
}
