//! Vela TencentCloud Provider
//!
//! CRUD for CynosDB clusters and accounts plus CWP license orders and
//! license bindings, and read-only machine/cluster listings. Every remote
//! call runs inside the shared retry loop; every asynchronous flow is
//! awaited through the shared task poller with a call-site status probe.

pub mod keys;
pub mod schemas;
pub mod status;

use std::collections::HashMap;

use tracing::{debug, info};
use vela_core::key::join_id;
use vela_core::provider::{
    BoxFuture, Provider, ProviderError, ProviderResult, ResourceSchema, ResourceType, set_optional,
};
use vela_core::resource::{Resource, ResourceId, State, Value};
use vela_core::retry::{READ_RETRY_TIMEOUT, RetryError, RetryPolicy, retry};
use vela_core::task::{PollConfig, TASK_POLL_INTERVAL, TaskState, await_completion};
use vela_tencent::{Credential, TencentClient, TencentError, cwp, cynosdb};

use crate::status::{ClusterStatus, ServerlessStatus};

const PAGE_SIZE: i64 = 100;
const DEFAULT_PORT: i64 = 5432;
const DEFAULT_ACCOUNT_HOST: &str = "%";
const ROOT_ACCOUNT: &str = "root";
const INSTANCE_TYPE_RW: &str = "rw";
const UPGRADE_IMMEDIATE: &str = "upgradeImmediate";
const ROLLBACK_NONE: &str = "noneRollback";
const DB_MODE_SERVERLESS: &str = "SERVERLESS";

/// Billing has not propagated the deal yet
const DEAL_NAME_NOT_FOUND: &str = "InvalidParameterValue.DealNameNotFound";
/// Parameter modification rejected while another flow holds the cluster
const OPERATION_FAILED_RETRYABLE: &str = "FailedOperation.OperationFailedError";
/// Pause/resume rejected while the previous switch is still settling
const SERVERLESS_STATUS_DENIED: &str = "OperationDenied.ServerlessClusterStatusDenied";
const CLUSTER_NOT_FOUND: &str = "InvalidParameterValue.ClusterNotFound";

/// Arguments the API cannot change on a live cluster
const IMMUTABLE_CLUSTER_ARGS: &[&str] = &[
    "available_zone",
    "vpc_id",
    "subnet_id",
    "db_type",
    "db_version",
    "port",
    "pay_mode",
    "project_id",
    "db_mode",
    "min_cpu",
    "max_cpu",
    "auto_pause",
    "auto_pause_delay",
];
const IMMUTABLE_ACCOUNT_ARGS: &[&str] = &["cluster_id", "account_name", "host"];
const IMMUTABLE_ORDER_ARGS: &[&str] = &["license_type", "region_id", "project_id"];
const IMMUTABLE_BIND_ARGS: &[&str] = &["resource_id", "license_id", "license_type", "quuid"];

/// CynosDB cluster resource type
pub struct CynosdbClusterType;

impl ResourceType for CynosdbClusterType {
    fn name(&self) -> &'static str {
        "cynosdb.cluster"
    }

    fn schema(&self) -> ResourceSchema {
        schemas::cynosdb::cluster_schema()
    }
}

/// CynosDB account resource type
pub struct CynosdbAccountType;

impl ResourceType for CynosdbAccountType {
    fn name(&self) -> &'static str {
        "cynosdb.account"
    }

    fn schema(&self) -> ResourceSchema {
        schemas::cynosdb::account_schema()
    }
}

/// CynosDB cluster listing data source
pub struct CynosdbClustersType;

impl ResourceType for CynosdbClustersType {
    fn name(&self) -> &'static str {
        "cynosdb.clusters"
    }

    fn schema(&self) -> ResourceSchema {
        schemas::cynosdb::clusters_schema()
    }
}

/// CWP license order resource type
pub struct CwpLicenseOrderType;

impl ResourceType for CwpLicenseOrderType {
    fn name(&self) -> &'static str {
        "cwp.license_order"
    }

    fn schema(&self) -> ResourceSchema {
        schemas::cwp::license_order_schema()
    }
}

/// CWP license bind resource type
pub struct CwpLicenseBindType;

impl ResourceType for CwpLicenseBindType {
    fn name(&self) -> &'static str {
        "cwp.license_bind"
    }

    fn schema(&self) -> ResourceSchema {
        schemas::cwp::license_bind_schema()
    }
}

/// CWP machine listing data source
pub struct CwpMachinesType;

impl ResourceType for CwpMachinesType {
    fn name(&self) -> &'static str {
        "cwp.machines"
    }

    fn schema(&self) -> ResourceSchema {
        schemas::cwp::machines_schema()
    }
}

/// TencentCloud Provider
pub struct TencentCloudProvider {
    client: TencentClient,
}

impl TencentCloudProvider {
    /// Create a provider with credentials from the environment
    pub fn new(region: impl Into<String>) -> ProviderResult<Self> {
        let credential = Credential::from_env().map_err(|e| ProviderError::new(e.to_string()))?;
        Ok(Self {
            client: TencentClient::new(credential, region),
        })
    }

    /// Create a provider with a pre-built client (for testing)
    pub fn with_client(client: TencentClient) -> Self {
        Self { client }
    }

    pub fn region(&self) -> &str {
        self.client.region()
    }

    // ========== CynosDB Cluster Operations ==========

    /// One DescribeClusters call filtered to a single cluster id
    async fn list_cluster_once(
        &self,
        cluster_id: &str,
    ) -> Result<Option<cynosdb::Cluster>, TencentError> {
        let request = cynosdb::DescribeClustersRequest {
            filters: Some(vec![cynosdb::QueryFilter::exact("ClusterId", cluster_id)]),
            limit: Some(PAGE_SIZE),
            offset: Some(0),
        };
        let response = self.client.describe_clusters(&request).await?;
        Ok(response
            .cluster_set
            .into_iter()
            .find(|c| c.cluster_id.as_deref() == Some(cluster_id)))
    }

    /// One DescribeClusterDetail call
    async fn detail_once(&self, cluster_id: &str) -> Result<cynosdb::ClusterDetail, TencentError> {
        let request = cynosdb::DescribeClusterDetailRequest {
            cluster_id: cluster_id.to_string(),
        };
        let response = self.client.describe_cluster_detail(&request).await?;
        Ok(response.detail.unwrap_or_default())
    }

    /// One attempt at settling a cluster lookup.
    ///
    /// Absent and isolated/offlined/deleted clusters are `None`. A running
    /// cluster is `Some`. Every other status means an operation is in
    /// flight, reported as transient so the retry loop waits it out.
    async fn find_cluster(
        &self,
        cluster_id: &str,
    ) -> Result<Option<cynosdb::Cluster>, RetryError> {
        let cluster = self
            .list_cluster_once(cluster_id)
            .await
            .map_err(|e| status::call_error(e, &[]))?;
        let Some(cluster) = cluster else {
            return Ok(None);
        };

        let cluster_status = ClusterStatus::parse(cluster.status.as_deref().unwrap_or_default());
        if cluster_status.is_gone() {
            return Ok(None);
        }
        if cluster_status != ClusterStatus::Running {
            return Err(RetryError::transient(format!(
                "cynosdb cluster {} is still in processing ({})",
                cluster_id,
                cluster_status.as_str()
            )));
        }
        Ok(Some(cluster))
    }

    /// Look up a cluster, waiting out any in-flight operation
    async fn describe_cluster(&self, cluster_id: &str) -> ProviderResult<Option<cynosdb::Cluster>> {
        retry(RetryPolicy::read(), || self.find_cluster(cluster_id)).await
    }

    async fn fetch_detail(&self, cluster_id: &str) -> ProviderResult<cynosdb::ClusterDetail> {
        retry(RetryPolicy::read(), || async {
            self.detail_once(cluster_id)
                .await
                .map_err(|e| status::call_error(e, &[]))
        })
        .await
    }

    async fn read_cluster(
        &self,
        id: &ResourceId,
        identifier: Option<&str>,
    ) -> ProviderResult<State> {
        let Some(cluster_id) = identifier else {
            return Ok(State::not_found(id.clone()));
        };
        let Some(cluster) = self.describe_cluster(cluster_id).await? else {
            return Ok(State::not_found(id.clone()));
        };
        let detail = self.fetch_detail(cluster_id).await?;

        let attrs = cluster_attrs(&cluster, &detail);
        Ok(State::existing(id.clone(), attrs).with_identifier(cluster_id))
    }

    async fn create_cluster(&self, resource: &Resource) -> ProviderResult<State> {
        let request = cluster_create_request(resource)?;

        let response = retry(RetryPolicy::write(), || async {
            self.client
                .create_clusters(&request)
                .await
                .map_err(|e| status::call_error(e, &[]))
        })
        .await?;
        if response.deal_names.len() != 1 {
            return Err(ProviderError::new("cynosdb cluster id count isn't 1"));
        }
        let deal_name = response.deal_names[0].clone();

        let billing_request = cynosdb::DescribeResourcesByDealNameRequest {
            deal_name: deal_name.clone(),
        };
        let billing = retry(RetryPolicy::read(), || async {
            self.client
                .describe_resources_by_deal_name(&billing_request)
                .await
                .map_err(|e| status::call_error(e, &[DEAL_NAME_NOT_FOUND]))
        })
        .await?;
        if billing.billing_resource_infos.len() != 1 {
            return Err(ProviderError::new("cynosdb cluster id count isn't 1"));
        }
        let cluster_id = billing.billing_resource_infos[0]
            .cluster_id
            .clone()
            .ok_or_else(|| {
                ProviderError::new(format!("deal {} resolved without a cluster id", deal_name))
            })?;

        // The remote id exists from this point, before the cluster is ready
        info!(cluster_id = %cluster_id, "cynosdb cluster allocated");

        let settled = retry(RetryPolicy::read().with_timeout(READ_RETRY_TIMEOUT * 5), || {
            self.find_cluster(&cluster_id)
        })
        .await?;
        if settled.is_none() {
            return Err(ProviderError::new(
                "creating cynosdb cluster failed: cluster does not exist",
            ));
        }

        if let Some(slave_zone) = opt_str(&resource.attributes, "slave_zone") {
            self.add_slave_zone(&cluster_id, &slave_zone).await?;
        }
        if opt_str(&resource.attributes, "serverless_status_flag").as_deref() == Some("pause") {
            self.switch_serverless(&cluster_id, false).await?;
        }

        let state = self.read_cluster(&resource.id, Some(&cluster_id)).await?;
        Ok(merge_declared(resource, state))
    }

    async fn update_cluster(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> ProviderResult<State> {
        if let Some(arg) = find_immutable_change(&from.attributes, &to.attributes, IMMUTABLE_CLUSTER_ARGS)
        {
            return Err(ProviderError::new(format!(
                "argument {} cannot be modified",
                arg
            )));
        }
        let cluster_id = identifier;

        if changed(from, to, "cluster_name") {
            let request = cynosdb::ModifyClusterNameRequest {
                cluster_id: cluster_id.to_string(),
                cluster_name: required_str(to, "cluster_name")?,
            };
            retry(RetryPolicy::write(), || async {
                self.client
                    .modify_cluster_name(&request)
                    .await
                    .map_err(|e| status::call_error(e, &[]))
            })
            .await?;
        }

        if changed(from, to, "storage_limit")
            && let Some(new_limit) = opt_i64(&to.attributes, "storage_limit")
        {
            let request = cynosdb::ModifyClusterStorageRequest {
                cluster_id: cluster_id.to_string(),
                new_storage_limit: new_limit,
                old_storage_limit: opt_i64(&from.attributes, "storage_limit"),
                deal_mode: None,
            };
            retry(RetryPolicy::write(), || async {
                self.client
                    .modify_cluster_storage(&request)
                    .await
                    .map_err(|e| status::call_error(e, &[]))
            })
            .await?;
        }

        if changed(from, to, "instance_cpu_core") || changed(from, to, "instance_memory_size") {
            let cpu = opt_i64(&to.attributes, "instance_cpu_core").ok_or_else(|| {
                ProviderError::new("instance_cpu_core is required to resize the instance")
            })?;
            let memory = opt_i64(&to.attributes, "instance_memory_size").ok_or_else(|| {
                ProviderError::new("instance_memory_size is required to resize the instance")
            })?;
            self.upgrade_rw_instance(cluster_id, cpu, memory).await?;
        }

        if changed(from, to, "param_items") {
            let items = parse_param_items(&to.attributes)?;
            if !items.is_empty() {
                self.apply_param_items(cluster_id, &items).await?;
            }
        }

        if changed(from, to, "slave_zone")
            && let Some(new_zone) = opt_str(&to.attributes, "slave_zone")
        {
            match opt_str(&from.attributes, "slave_zone") {
                Some(old_zone) => self.modify_slave_zone(cluster_id, &old_zone, &new_zone).await?,
                None => self.add_slave_zone(cluster_id, &new_zone).await?,
            }
        }

        if changed(from, to, "serverless_status_flag")
            && let Some(flag) = opt_str(&to.attributes, "serverless_status_flag")
        {
            self.switch_serverless(cluster_id, flag == "resume").await?;
        }

        if changed(from, to, "password")
            && let Some(password) = opt_str(&to.attributes, "password")
        {
            let request = cynosdb::ResetAccountPasswordRequest {
                cluster_id: cluster_id.to_string(),
                account_name: ROOT_ACCOUNT.to_string(),
                account_password: password,
                host: None,
            };
            retry(RetryPolicy::write(), || async {
                self.client
                    .reset_account_password(&request)
                    .await
                    .map_err(|e| status::call_error(e, &[]))
            })
            .await?;
        }

        let state = self.read_cluster(id, Some(cluster_id)).await?;
        Ok(merge_declared(to, state))
    }

    async fn delete_cluster(&self, identifier: &str) -> ProviderResult<()> {
        let cluster_id = identifier;

        let isolate = cynosdb::IsolateClusterRequest {
            cluster_id: cluster_id.to_string(),
        };
        retry(RetryPolicy::write(), || async {
            match self.client.isolate_cluster(&isolate).await {
                Ok(_) => Ok(()),
                Err(e) if e.is_code(CLUSTER_NOT_FOUND) => Ok(()),
                // Billing teardown settles out of band after the order is placed
                Err(e) if e.message_contains("return not found valid deal") => {
                    Err(RetryError::transient(e.to_string()))
                }
                Err(e) => Err(status::call_error(e, &[])),
            }
        })
        .await?;

        self.wait_cluster_status(cluster_id, |cluster_status| {
            cluster_status.is_none() || cluster_status.is_some_and(|s| s.is_gone())
        })
        .await?;

        let offline = cynosdb::OfflineClusterRequest {
            cluster_id: cluster_id.to_string(),
        };
        retry(RetryPolicy::write(), || async {
            match self.client.offline_cluster(&offline).await {
                Ok(_) => Ok(()),
                Err(e)
                    if e.is_code(CLUSTER_NOT_FOUND) || e.message_contains("record not found") =>
                {
                    Ok(())
                }
                Err(e) if e.message_contains("IsolateInstanceFlow failed") => {
                    Err(RetryError::transient(e.to_string()))
                }
                Err(e) => Err(status::call_error(e, &[])),
            }
        })
        .await?;

        self.wait_cluster_status(cluster_id, |cluster_status| {
            matches!(
                cluster_status,
                None | Some(ClusterStatus::Offlined) | Some(ClusterStatus::Deleted)
            )
        })
        .await?;

        info!(cluster_id = %cluster_id, "cynosdb cluster offlined");
        Ok(())
    }

    /// Poll the cluster list until `done` accepts its status (None = gone)
    async fn wait_cluster_status<F>(&self, cluster_id: &str, done: F) -> ProviderResult<()>
    where
        F: Fn(Option<ClusterStatus>) -> bool,
    {
        await_completion(
            PollConfig::new(TASK_POLL_INTERVAL, READ_RETRY_TIMEOUT),
            || async {
                let cluster = self
                    .list_cluster_once(cluster_id)
                    .await
                    .map_err(status::probe_error)?;
                let cluster_status = cluster
                    .map(|c| ClusterStatus::parse(c.status.as_deref().unwrap_or_default()));
                Ok(if done(cluster_status) {
                    TaskState::Success
                } else {
                    TaskState::Pending
                })
            },
        )
        .await?;
        Ok(())
    }

    async fn upgrade_rw_instance(
        &self,
        cluster_id: &str,
        cpu: i64,
        memory: i64,
    ) -> ProviderResult<()> {
        let detail = self.fetch_detail(cluster_id).await?;
        let instance_id = detail
            .instance_set
            .iter()
            .find(|i| i.instance_type.as_deref() == Some(INSTANCE_TYPE_RW))
            .and_then(|i| i.instance_id.clone())
            .ok_or_else(|| {
                ProviderError::new(format!("cluster {} has no read-write instance", cluster_id))
            })?;

        let request = cynosdb::UpgradeInstanceRequest {
            instance_id,
            cpu,
            memory,
            upgrade_type: UPGRADE_IMMEDIATE.to_string(),
        };
        retry(RetryPolicy::write(), || async {
            self.client
                .upgrade_instance(&request)
                .await
                .map_err(|e| status::call_error(e, &[]))
        })
        .await?;

        // The upgrade has no flow id; done when the instance reports the
        // requested size
        await_completion(
            PollConfig::new(TASK_POLL_INTERVAL, READ_RETRY_TIMEOUT),
            || async {
                let detail = self
                    .detail_once(cluster_id)
                    .await
                    .map_err(status::probe_error)?;
                let resized = detail.instance_set.iter().any(|i| {
                    i.instance_type.as_deref() == Some(INSTANCE_TYPE_RW)
                        && i.instance_cpu == Some(cpu)
                        && i.instance_memory == Some(memory)
                });
                Ok(if resized {
                    TaskState::Success
                } else {
                    TaskState::Pending
                })
            },
        )
        .await?;
        Ok(())
    }

    async fn apply_param_items(
        &self,
        cluster_id: &str,
        items: &[(String, String)],
    ) -> ProviderResult<()> {
        // OldValue must match what the server currently has
        let params_request = cynosdb::DescribeClusterParamsRequest {
            cluster_id: cluster_id.to_string(),
        };
        let current = retry(RetryPolicy::read(), || async {
            self.client
                .describe_cluster_params(&params_request)
                .await
                .map_err(|e| status::call_error(e, &[]))
        })
        .await?;
        let old_values: HashMap<&str, &str> = current
            .items
            .iter()
            .filter_map(|p| Some((p.param_name.as_deref()?, p.current_value.as_deref()?)))
            .collect();

        let param_list = items
            .iter()
            .map(|(name, value)| cynosdb::ParamItem {
                param_name: name.clone(),
                current_value: value.clone(),
                old_value: old_values.get(name.as_str()).map(|v| v.to_string()),
            })
            .collect();

        let request = cynosdb::ModifyClusterParamRequest {
            cluster_id: cluster_id.to_string(),
            param_list,
            is_in_maintain_period: Some("no".to_string()),
        };
        let response = retry(RetryPolicy::write(), || async {
            self.client
                .modify_cluster_param(&request)
                .await
                .map_err(|e| status::call_error(e, &[OPERATION_FAILED_RETRYABLE]))
        })
        .await?;

        if let Some(async_request_id) = response.async_request_id {
            self.wait_async_request(&async_request_id).await?;
        }
        Ok(())
    }

    async fn wait_async_request(&self, async_request_id: &str) -> ProviderResult<()> {
        let request = cynosdb::DescribeAsyncRequestInfoRequest {
            async_request_id: async_request_id.to_string(),
        };
        await_completion(
            PollConfig::new(TASK_POLL_INTERVAL, READ_RETRY_TIMEOUT),
            || async {
                let response = self
                    .client
                    .describe_async_request_info(&request)
                    .await
                    .map_err(status::probe_error)?;
                Ok(status::async_request_state(
                    response.status.as_deref().unwrap_or_default(),
                    response.info.as_deref().unwrap_or_default(),
                ))
            },
        )
        .await?;
        Ok(())
    }

    async fn wait_flow(&self, flow_id: i64) -> ProviderResult<()> {
        let request = cynosdb::DescribeFlowRequest { flow_id };
        await_completion(PollConfig::task(), || async {
            let response = self
                .client
                .describe_flow(&request)
                .await
                .map_err(status::probe_error)?;
            Ok(match response.status {
                Some(code) => status::flow_state(code),
                None => TaskState::Pending,
            })
        })
        .await?;
        Ok(())
    }

    async fn add_slave_zone(&self, cluster_id: &str, slave_zone: &str) -> ProviderResult<()> {
        let request = cynosdb::AddClusterSlaveZoneRequest {
            cluster_id: cluster_id.to_string(),
            slave_zone: slave_zone.to_string(),
        };
        let response = retry(RetryPolicy::write(), || async {
            self.client
                .add_cluster_slave_zone(&request)
                .await
                .map_err(|e| status::call_error(e, &[]))
        })
        .await?;
        if let Some(flow_id) = response.flow_id {
            self.wait_flow(flow_id).await?;
        }
        Ok(())
    }

    async fn modify_slave_zone(
        &self,
        cluster_id: &str,
        old_zone: &str,
        new_zone: &str,
    ) -> ProviderResult<()> {
        let request = cynosdb::ModifyClusterSlaveZoneRequest {
            cluster_id: cluster_id.to_string(),
            old_slave_zone: old_zone.to_string(),
            new_slave_zone: new_zone.to_string(),
        };
        let response = retry(RetryPolicy::write(), || async {
            self.client
                .modify_cluster_slave_zone(&request)
                .await
                .map_err(|e| status::call_error(e, &[]))
        })
        .await?;
        if let Some(flow_id) = response.flow_id {
            self.wait_flow(flow_id).await?;
        }
        Ok(())
    }

    /// Drive a serverless cluster to resumed or paused.
    ///
    /// Submits pause/resume once the cluster is out of any transition, then
    /// waits until the target status is reported. Clusters without a
    /// serverless status are left alone.
    async fn switch_serverless(&self, cluster_id: &str, resume: bool) -> ProviderResult<()> {
        let target = if resume { "resume" } else { "pause" };

        let detail = self.fetch_detail(cluster_id).await?;
        if detail.serverless_status.is_none() {
            return Ok(());
        }

        retry(RetryPolicy::write(), || async {
            let detail = self
                .detail_once(cluster_id)
                .await
                .map_err(|e| status::call_error(e, &[]))?;
            let current =
                ServerlessStatus::parse(detail.serverless_status.as_deref().unwrap_or_default());
            if current.is_transitioning() {
                return Err(RetryError::transient(format!(
                    "waiting for status {} finish",
                    current.as_str()
                )));
            }
            if current.as_str() == target {
                return Ok(());
            }

            let result = if resume {
                let request = cynosdb::ResumeServerlessRequest {
                    cluster_id: cluster_id.to_string(),
                };
                self.client.resume_serverless(&request).await.map(|_| ())
            } else {
                let request = cynosdb::PauseServerlessRequest {
                    cluster_id: cluster_id.to_string(),
                    force_pause: None,
                };
                self.client.pause_serverless(&request).await.map(|_| ())
            };
            result.map_err(|e| status::call_error(e, &[SERVERLESS_STATUS_DENIED]))
        })
        .await?;

        await_completion(
            PollConfig::new(TASK_POLL_INTERVAL, READ_RETRY_TIMEOUT * 5),
            || async {
                let detail = self
                    .detail_once(cluster_id)
                    .await
                    .map_err(status::probe_error)?;
                let current = ServerlessStatus::parse(
                    detail.serverless_status.as_deref().unwrap_or_default(),
                );
                Ok(if current.as_str() == target {
                    TaskState::Success
                } else {
                    TaskState::Pending
                })
            },
        )
        .await?;
        Ok(())
    }

    // ========== CynosDB Account Operations ==========

    async fn read_account(
        &self,
        id: &ResourceId,
        identifier: Option<&str>,
    ) -> ProviderResult<State> {
        let Some(identifier) = identifier else {
            return Ok(State::not_found(id.clone()));
        };
        let key = keys::AccountId::decode(identifier)
            .map_err(|e| ProviderError::new(e.to_string()))?;

        let request = cynosdb::DescribeAccountsRequest {
            cluster_id: key.cluster_id.clone(),
            account_names: Some(vec![key.account_name.clone()]),
            hosts: Some(vec![key.host.clone()]),
            limit: Some(PAGE_SIZE),
            offset: Some(0),
        };
        let response = retry(RetryPolicy::read(), || async {
            match self.client.describe_accounts(&request).await {
                Ok(r) => Ok(Some(r)),
                Err(e) if e.is_code(CLUSTER_NOT_FOUND) => Ok(None),
                Err(e) => Err(status::call_error(e, &[])),
            }
        })
        .await?;
        let Some(response) = response else {
            return Ok(State::not_found(id.clone()));
        };

        let account = response.account_set.into_iter().find(|a| {
            a.account_name.as_deref() == Some(key.account_name.as_str())
                && a.host.as_deref() == Some(key.host.as_str())
        });
        let Some(account) = account else {
            return Ok(State::not_found(id.clone()));
        };

        let mut attrs = HashMap::new();
        attrs.insert("cluster_id".to_string(), Value::String(key.cluster_id));
        set_optional(&mut attrs, "account_name", account.account_name, Value::String);
        set_optional(&mut attrs, "host", account.host, Value::String);
        set_optional(&mut attrs, "description", account.description, Value::String);
        set_optional(&mut attrs, "create_time", account.create_time, Value::String);
        set_optional(&mut attrs, "update_time", account.update_time, Value::String);
        Ok(State::existing(id.clone(), attrs).with_identifier(identifier))
    }

    async fn create_account(&self, resource: &Resource) -> ProviderResult<State> {
        let cluster_id = required_str(resource, "cluster_id")?;
        let account_name = required_str(resource, "account_name")?;
        let password = required_str(resource, "password")?;
        let host = opt_str(&resource.attributes, "host")
            .unwrap_or_else(|| DEFAULT_ACCOUNT_HOST.to_string());

        let request = cynosdb::CreateAccountsRequest {
            cluster_id: cluster_id.clone(),
            accounts: vec![cynosdb::NewAccount {
                account_name: account_name.clone(),
                account_password: password,
                host: host.clone(),
                description: opt_str(&resource.attributes, "description"),
            }],
        };
        retry(RetryPolicy::write(), || async {
            self.client
                .create_accounts(&request)
                .await
                .map_err(|e| status::call_error(e, &[]))
        })
        .await?;

        let identifier = keys::AccountId::new(cluster_id, account_name, host).encode();
        let state = self.read_account(&resource.id, Some(&identifier)).await?;
        Ok(merge_declared(resource, state))
    }

    async fn update_account(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> ProviderResult<State> {
        if let Some(arg) =
            find_immutable_change(&from.attributes, &to.attributes, IMMUTABLE_ACCOUNT_ARGS)
        {
            return Err(ProviderError::new(format!(
                "argument {} cannot be modified",
                arg
            )));
        }
        let key = keys::AccountId::decode(identifier)
            .map_err(|e| ProviderError::new(e.to_string()))?;

        if changed(from, to, "password")
            && let Some(password) = opt_str(&to.attributes, "password")
        {
            let request = cynosdb::ResetAccountPasswordRequest {
                cluster_id: key.cluster_id.clone(),
                account_name: key.account_name.clone(),
                account_password: password,
                host: Some(key.host.clone()),
            };
            retry(RetryPolicy::write(), || async {
                self.client
                    .reset_account_password(&request)
                    .await
                    .map_err(|e| status::call_error(e, &[]))
            })
            .await?;
        }

        if changed(from, to, "description") {
            let request = cynosdb::ModifyAccountDescriptionRequest {
                cluster_id: key.cluster_id.clone(),
                account_name: key.account_name.clone(),
                host: key.host.clone(),
                description: opt_str(&to.attributes, "description").unwrap_or_default(),
            };
            retry(RetryPolicy::write(), || async {
                self.client
                    .modify_account_description(&request)
                    .await
                    .map_err(|e| status::call_error(e, &[]))
            })
            .await?;
        }

        let state = self.read_account(id, Some(identifier)).await?;
        Ok(merge_declared(to, state))
    }

    async fn delete_account(&self, identifier: &str) -> ProviderResult<()> {
        let key = keys::AccountId::decode(identifier)
            .map_err(|e| ProviderError::new(e.to_string()))?;

        let request = cynosdb::DeleteAccountsRequest {
            cluster_id: key.cluster_id.clone(),
            accounts: vec![cynosdb::InputAccount {
                account_name: key.account_name.clone(),
                host: key.host.clone(),
            }],
        };
        retry(RetryPolicy::write(), || async {
            match self.client.delete_accounts(&request).await {
                Ok(_) => Ok(()),
                Err(e)
                    if e.is_code(CLUSTER_NOT_FOUND) || e.code_starts_with("ResourceNotFound") =>
                {
                    Ok(())
                }
                Err(e) => Err(status::call_error(e, &[])),
            }
        })
        .await?;
        Ok(())
    }

    // ========== CWP License Order Operations ==========

    /// One DescribeLicenseList call filtered to a single resource id
    async fn find_license_once(
        &self,
        resource_id: &str,
    ) -> Result<Option<cwp::LicenseDetail>, TencentError> {
        let request = cwp::DescribeLicenseListRequest {
            filters: Some(vec![cwp::Filter::new(
                "ResourceId",
                vec![resource_id.to_string()],
            )]),
            limit: Some(PAGE_SIZE),
            offset: Some(0),
        };
        let response = self.client.describe_license_list(&request).await?;
        Ok(response
            .list
            .into_iter()
            .find(|l| l.resource_id.as_deref() == Some(resource_id)))
    }

    async fn read_license_order(
        &self,
        id: &ResourceId,
        identifier: Option<&str>,
    ) -> ProviderResult<State> {
        let Some(identifier) = identifier else {
            return Ok(State::not_found(id.clone()));
        };
        let key = keys::LicenseOrderId::decode(identifier)
            .map_err(|e| ProviderError::new(e.to_string()))?;

        let license = retry(RetryPolicy::read(), || async {
            self.find_license_once(&key.resource_id)
                .await
                .map_err(|e| status::call_error(e, &[]))
        })
        .await?;
        let Some(license) = license else {
            return Ok(State::not_found(id.clone()));
        };

        let mut attrs = HashMap::new();
        attrs.insert(
            "resource_id".to_string(),
            Value::String(key.resource_id.clone()),
        );
        attrs.insert("license_type".to_string(), Value::Int(key.license_type as i64));
        set_optional(&mut attrs, "alias", license.alias, Value::String);
        set_optional(&mut attrs, "license_num", license.license_cnt, |v| {
            Value::Int(v as i64)
        });
        set_optional(&mut attrs, "used_license_num", license.used_license_cnt, |v| {
            Value::Int(v as i64)
        });
        set_optional(&mut attrs, "license_id", license.license_id, |v| {
            Value::Int(v as i64)
        });
        set_optional(&mut attrs, "license_status", license.license_status, Value::Int);
        set_optional(&mut attrs, "buy_time", license.buy_time, Value::String);
        Ok(State::existing(id.clone(), attrs).with_identifier(identifier))
    }

    async fn create_license_order(&self, resource: &Resource) -> ProviderResult<State> {
        let license_type = opt_u64(&resource.attributes, "license_type").unwrap_or(0);
        let request = cwp::CreateLicenseOrderRequest {
            license_type: Some(license_type),
            license_num: Some(opt_u64(&resource.attributes, "license_num").unwrap_or(1)),
            region_id: Some(opt_u64(&resource.attributes, "region_id").unwrap_or(1)),
            project_id: Some(opt_u64(&resource.attributes, "project_id").unwrap_or(0)),
            alias: opt_str(&resource.attributes, "alias"),
        };
        let response = retry(RetryPolicy::write(), || async {
            self.client
                .create_license_order(&request)
                .await
                .map_err(|e| status::call_error(e, &[]))
        })
        .await?;
        if response.resource_ids.len() != 1 {
            return Err(ProviderError::new(
                "cwp license order resource id count isn't 1",
            ));
        }

        let key = keys::LicenseOrderId::new(response.resource_ids[0].clone(), license_type);
        let identifier = key.encode();
        info!(resource_id = %key.resource_id, "cwp license order allocated");

        // The order shows up in the license list once billing settles
        await_completion(
            PollConfig::new(TASK_POLL_INTERVAL, READ_RETRY_TIMEOUT),
            || async {
                let license = self
                    .find_license_once(&key.resource_id)
                    .await
                    .map_err(status::probe_error)?;
                Ok(if license.is_some() {
                    TaskState::Success
                } else {
                    TaskState::Pending
                })
            },
        )
        .await?;

        let state = self.read_license_order(&resource.id, Some(&identifier)).await?;
        Ok(merge_declared(resource, state))
    }

    async fn update_license_order(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> ProviderResult<State> {
        if let Some(arg) =
            find_immutable_change(&from.attributes, &to.attributes, IMMUTABLE_ORDER_ARGS)
        {
            return Err(ProviderError::new(format!(
                "argument {} cannot be modified",
                arg
            )));
        }
        let key = keys::LicenseOrderId::decode(identifier)
            .map_err(|e| ProviderError::new(e.to_string()))?;

        if changed(from, to, "alias") || changed(from, to, "license_num") {
            let request = cwp::ModifyLicenseOrderRequest {
                resource_id: key.resource_id.clone(),
                inquire_num: opt_u64(&to.attributes, "license_num"),
                project_id: None,
                alias: opt_str(&to.attributes, "alias"),
            };
            retry(RetryPolicy::write(), || async {
                self.client
                    .modify_license_order(&request)
                    .await
                    .map_err(|e| status::call_error(e, &[]))
            })
            .await?;

            if let Some(target) = opt_u64(&to.attributes, "license_num") {
                await_completion(
                    PollConfig::new(TASK_POLL_INTERVAL, READ_RETRY_TIMEOUT),
                    || async {
                        let license = self
                            .find_license_once(&key.resource_id)
                            .await
                            .map_err(status::probe_error)?;
                        Ok(match license {
                            Some(l) if l.license_cnt == Some(target) => TaskState::Success,
                            _ => TaskState::Pending,
                        })
                    },
                )
                .await?;
            }
        }

        let state = self.read_license_order(id, Some(identifier)).await?;
        Ok(merge_declared(to, state))
    }

    async fn delete_license_order(&self, identifier: &str) -> ProviderResult<()> {
        let key = keys::LicenseOrderId::decode(identifier)
            .map_err(|e| ProviderError::new(e.to_string()))?;

        let request = cwp::DestroyOrderRequest {
            resource_id: key.resource_id.clone(),
        };
        retry(RetryPolicy::write(), || async {
            match self.client.destroy_order(&request).await {
                Ok(_) => Ok(()),
                Err(e)
                    if e.code_starts_with("ResourceNotFound") || e.message_contains("not found") =>
                {
                    Ok(())
                }
                Err(e) => Err(status::call_error(e, &[])),
            }
        })
        .await?;
        Ok(())
    }

    // ========== CWP License Bind Operations ==========

    /// One DescribeLicenseBindList call filtered to a single machine
    async fn find_bind_once(
        &self,
        resource_id: &str,
        quuid: &str,
    ) -> Result<Option<cwp::LicenseBindDetail>, TencentError> {
        let request = cwp::DescribeLicenseBindListRequest {
            resource_id: resource_id.to_string(),
            limit: Some(PAGE_SIZE),
            offset: Some(0),
            filters: Some(vec![cwp::Filter::new("Quuid", vec![quuid.to_string()])]),
        };
        let response = self.client.describe_license_bind_list(&request).await?;
        Ok(response
            .list
            .into_iter()
            .find(|b| b.quuid.as_deref() == Some(quuid)))
    }

    async fn read_license_bind(
        &self,
        id: &ResourceId,
        identifier: Option<&str>,
    ) -> ProviderResult<State> {
        let Some(identifier) = identifier else {
            return Ok(State::not_found(id.clone()));
        };
        let key = keys::LicenseBindId::decode(identifier)
            .map_err(|e| ProviderError::new(e.to_string()))?;

        let bind = retry(RetryPolicy::read(), || async {
            self.find_bind_once(&key.resource_id, &key.quuid)
                .await
                .map_err(|e| status::call_error(e, &[]))
        })
        .await?;

        match bind {
            Some(bind) if bind.is_un_bind != Some(true) => {
                let mut attrs = HashMap::new();
                attrs.insert(
                    "resource_id".to_string(),
                    Value::String(key.resource_id.clone()),
                );
                attrs.insert("license_id".to_string(), Value::Int(key.license_id as i64));
                attrs.insert(
                    "license_type".to_string(),
                    Value::Int(key.license_type as i64),
                );
                attrs.insert("quuid".to_string(), Value::String(key.quuid.clone()));
                set_optional(&mut attrs, "machine_name", bind.machine_name, Value::String);
                set_optional(&mut attrs, "machine_wan_ip", bind.machine_wan_ip, Value::String);
                set_optional(&mut attrs, "agent_status", bind.agent_status, Value::String);
                Ok(State::existing(id.clone(), attrs).with_identifier(identifier))
            }
            _ => Ok(State::not_found(id.clone())),
        }
    }

    async fn create_license_bind(&self, resource: &Resource) -> ProviderResult<State> {
        let resource_id = required_str(resource, "resource_id")?;
        let license_id = required_u64(resource, "license_id")?;
        let license_type = required_u64(resource, "license_type")?;
        let quuid = required_str(resource, "quuid")?;

        let request = cwp::ModifyLicenseBindsRequest {
            resource_id: resource_id.clone(),
            license_type,
            is_all_bound: Some(false),
            quuid_list: Some(vec![quuid.clone()]),
        };
        let response = retry(RetryPolicy::write(), || async {
            self.client
                .modify_license_binds(&request)
                .await
                .map_err(|e| status::call_error(e, &[]))
        })
        .await?;

        if let Some(task_id) = response.task_id {
            self.wait_bind_task(task_id, &quuid).await?;
        }

        let identifier =
            keys::LicenseBindId::new(resource_id, license_id, quuid, license_type).encode();
        let state = self.read_license_bind(&resource.id, Some(&identifier)).await?;
        Ok(merge_declared(resource, state))
    }

    /// Poll the bind schedule until this machine reports bound or failed
    async fn wait_bind_task(&self, task_id: u64, quuid: &str) -> ProviderResult<()> {
        let request = cwp::DescribeLicenseBindScheduleRequest {
            task_id,
            limit: Some(PAGE_SIZE),
            offset: Some(0),
            filters: None,
        };
        await_completion(
            PollConfig::new(TASK_POLL_INTERVAL, READ_RETRY_TIMEOUT),
            || async {
                let response = self
                    .client
                    .describe_license_bind_schedule(&request)
                    .await
                    .map_err(status::probe_error)?;
                let entry = response
                    .list
                    .iter()
                    .find(|t| t.quuid.as_deref() == Some(quuid));
                Ok(match entry {
                    Some(task) => status::bind_task_state(
                        task.status.unwrap_or(0),
                        task.err_msg.as_deref().unwrap_or_default(),
                    ),
                    None => TaskState::Pending,
                })
            },
        )
        .await?;
        Ok(())
    }

    async fn update_license_bind(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> ProviderResult<State> {
        if let Some(arg) =
            find_immutable_change(&from.attributes, &to.attributes, IMMUTABLE_BIND_ARGS)
        {
            return Err(ProviderError::new(format!(
                "argument {} cannot be modified",
                arg
            )));
        }
        self.read_license_bind(id, Some(identifier)).await
    }

    async fn delete_license_bind(&self, identifier: &str) -> ProviderResult<()> {
        let key = keys::LicenseBindId::decode(identifier)
            .map_err(|e| ProviderError::new(e.to_string()))?;

        let request = cwp::ModifyLicenseUnBindsRequest {
            resource_id: key.resource_id.clone(),
            license_type: key.license_type,
            is_all_bound: Some(false),
            quuid_list: Some(vec![key.quuid.clone()]),
        };
        retry(RetryPolicy::write(), || async {
            match self.client.modify_license_un_binds(&request).await {
                Ok(_) => Ok(()),
                Err(e)
                    if e.code_starts_with("ResourceNotFound") || e.message_contains("not bind") =>
                {
                    Ok(())
                }
                Err(e) => Err(status::call_error(e, &[])),
            }
        })
        .await?;

        await_completion(
            PollConfig::new(TASK_POLL_INTERVAL, READ_RETRY_TIMEOUT),
            || async {
                let bind = self
                    .find_bind_once(&key.resource_id, &key.quuid)
                    .await
                    .map_err(status::probe_error)?;
                Ok(match bind {
                    None => TaskState::Success,
                    Some(b) if b.is_un_bind == Some(true) => TaskState::Success,
                    Some(_) => TaskState::Pending,
                })
            },
        )
        .await?;
        Ok(())
    }

    // ========== Data Sources ==========

    async fn query_machines(&self, resource: &Resource) -> ProviderResult<State> {
        let machine_type = required_str(resource, "machine_type")?;
        let machine_region = required_str(resource, "machine_region")?;

        let mut filters = Vec::new();
        if let Some(keyword) = opt_str(&resource.attributes, "keyword") {
            filters.push(cwp::Filter::new("Keywords", vec![keyword]));
        }
        let project_ids = resource
            .attributes
            .get("project_ids")
            .and_then(Value::as_list)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_i64)
                    .filter_map(|n| u64::try_from(n).ok())
                    .collect::<Vec<_>>()
            });

        let mut machines = Vec::new();
        let mut offset = 0;
        loop {
            let request = cwp::DescribeMachinesRequest {
                machine_type: machine_type.clone(),
                machine_region: machine_region.clone(),
                limit: Some(PAGE_SIZE),
                offset: Some(offset),
                filters: if filters.is_empty() {
                    None
                } else {
                    Some(filters.clone())
                },
                project_ids: project_ids.clone(),
            };
            let response = retry(RetryPolicy::read(), || async {
                self.client
                    .describe_machines(&request)
                    .await
                    .map_err(|e| status::call_error(e, &[]))
            })
            .await?;

            let page = response.machines.len() as i64;
            machines.extend(response.machines);
            if page < PAGE_SIZE {
                break;
            }
            offset += PAGE_SIZE;
        }
        debug!(count = machines.len(), "cwp machines listed");

        let total = machines.len() as i64;
        let mut attrs = resource.attributes.clone();
        attrs.insert(
            "machines".to_string(),
            Value::List(machines.into_iter().map(machine_to_value).collect()),
        );
        attrs.insert("total_count".to_string(), Value::Int(total));

        let identifier = join_id(&[machine_type.as_str(), machine_region.as_str()]);
        Ok(State::existing(resource.id.clone(), attrs).with_identifier(identifier))
    }

    async fn query_clusters(&self, resource: &Resource) -> ProviderResult<State> {
        let mut filters = Vec::new();
        let mut key_parts = Vec::new();
        for (attr, filter_name) in [
            ("cluster_id", "ClusterId"),
            ("cluster_name", "ClusterName"),
            ("db_type", "DbType"),
            ("project_id", "ProjectId"),
        ] {
            let Some(value) = resource.attributes.get(attr) else {
                continue;
            };
            let text = match value {
                Value::String(s) => s.clone(),
                Value::Int(n) => n.to_string(),
                _ => continue,
            };
            filters.push(cynosdb::QueryFilter::exact(filter_name, text.clone()));
            key_parts.push(text);
        }

        let mut clusters = Vec::new();
        let mut offset = 0;
        loop {
            let request = cynosdb::DescribeClustersRequest {
                filters: if filters.is_empty() {
                    None
                } else {
                    Some(filters.clone())
                },
                limit: Some(PAGE_SIZE),
                offset: Some(offset),
            };
            let response = retry(RetryPolicy::read(), || async {
                self.client
                    .describe_clusters(&request)
                    .await
                    .map_err(|e| status::call_error(e, &[]))
            })
            .await?;

            let page = response.cluster_set.len() as i64;
            clusters.extend(response.cluster_set);
            if page < PAGE_SIZE {
                break;
            }
            offset += PAGE_SIZE;
        }
        debug!(count = clusters.len(), "cynosdb clusters listed");

        let total = clusters.len() as i64;
        let mut attrs = resource.attributes.clone();
        attrs.insert(
            "cluster_list".to_string(),
            Value::List(clusters.into_iter().map(cluster_to_value).collect()),
        );
        attrs.insert("total_count".to_string(), Value::Int(total));

        let identifier = if key_parts.is_empty() {
            "all".to_string()
        } else {
            join_id(&key_parts)
        };
        Ok(State::existing(resource.id.clone(), attrs).with_identifier(identifier))
    }
}

impl Provider for TencentCloudProvider {
    fn name(&self) -> &'static str {
        "tencentcloud"
    }

    fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
        vec![
            Box::new(CynosdbClusterType),
            Box::new(CynosdbAccountType),
            Box::new(CynosdbClustersType),
            Box::new(CwpLicenseOrderType),
            Box::new(CwpLicenseBindType),
            Box::new(CwpMachinesType),
        ]
    }

    fn read(
        &self,
        id: &ResourceId,
        identifier: Option<&str>,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.map(str::to_string);
        Box::pin(async move {
            let result = match id.resource_type.as_str() {
                "cynosdb.cluster" => self.read_cluster(&id, identifier.as_deref()).await,
                "cynosdb.account" => self.read_account(&id, identifier.as_deref()).await,
                "cwp.license_order" => self.read_license_order(&id, identifier.as_deref()).await,
                "cwp.license_bind" => self.read_license_bind(&id, identifier.as_deref()).await,
                other => Err(ProviderError::new(format!(
                    "Unknown resource type: {}",
                    other
                ))),
            };
            result.map_err(|e| e.for_resource(id.clone()))
        })
    }

    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let resource = resource.clone();
        Box::pin(async move {
            let result = match resource.id.resource_type.as_str() {
                "cynosdb.cluster" => self.create_cluster(&resource).await,
                "cynosdb.account" => self.create_account(&resource).await,
                "cwp.license_order" => self.create_license_order(&resource).await,
                "cwp.license_bind" => self.create_license_bind(&resource).await,
                "cynosdb.clusters" | "cwp.machines" => Err(ProviderError::new(format!(
                    "{} is a data source and cannot be created",
                    resource.id.resource_type
                ))),
                other => Err(ProviderError::new(format!(
                    "Unknown resource type: {}",
                    other
                ))),
            };
            result.map_err(|e| e.for_resource(resource.id.clone()))
        })
    }

    fn update(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        let from = from.clone();
        let to = to.clone();
        Box::pin(async move {
            let result = match id.resource_type.as_str() {
                "cynosdb.cluster" => self.update_cluster(&id, &identifier, &from, &to).await,
                "cynosdb.account" => self.update_account(&id, &identifier, &from, &to).await,
                "cwp.license_order" => {
                    self.update_license_order(&id, &identifier, &from, &to).await
                }
                "cwp.license_bind" => self.update_license_bind(&id, &identifier, &from, &to).await,
                other => Err(ProviderError::new(format!(
                    "Unknown resource type: {}",
                    other
                ))),
            };
            result.map_err(|e| e.for_resource(id.clone()))
        })
    }

    fn delete(&self, id: &ResourceId, identifier: &str) -> BoxFuture<'_, ProviderResult<()>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        Box::pin(async move {
            let result = match id.resource_type.as_str() {
                "cynosdb.cluster" => self.delete_cluster(&identifier).await,
                "cynosdb.account" => self.delete_account(&identifier).await,
                "cwp.license_order" => self.delete_license_order(&identifier).await,
                "cwp.license_bind" => self.delete_license_bind(&identifier).await,
                other => Err(ProviderError::new(format!(
                    "Unknown resource type: {}",
                    other
                ))),
            };
            result.map_err(|e| e.for_resource(id.clone()))
        })
    }

    fn query(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let resource = resource.clone();
        Box::pin(async move {
            let result = match resource.id.resource_type.as_str() {
                "cwp.machines" => self.query_machines(&resource).await,
                "cynosdb.clusters" => self.query_clusters(&resource).await,
                other => Err(ProviderError::new(format!(
                    "{} is not a data source",
                    other
                ))),
            };
            result.map_err(|e| e.for_resource(resource.id.clone()))
        })
    }
}

// ========== Attribute Mapping ==========

fn required_str(resource: &Resource, key: &str) -> ProviderResult<String> {
    resource
        .attributes
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            ProviderError::new(format!(
                "{} requires attribute '{}'",
                resource.id.resource_type, key
            ))
        })
}

fn required_u64(resource: &Resource, key: &str) -> ProviderResult<u64> {
    resource
        .attributes
        .get(key)
        .and_then(Value::as_i64)
        .and_then(|n| u64::try_from(n).ok())
        .ok_or_else(|| {
            ProviderError::new(format!(
                "{} requires attribute '{}'",
                resource.id.resource_type, key
            ))
        })
}

fn opt_str(attrs: &HashMap<String, Value>, key: &str) -> Option<String> {
    attrs.get(key).and_then(Value::as_str).map(str::to_string)
}

fn opt_i64(attrs: &HashMap<String, Value>, key: &str) -> Option<i64> {
    attrs.get(key).and_then(Value::as_i64)
}

fn opt_u64(attrs: &HashMap<String, Value>, key: &str) -> Option<u64> {
    attrs
        .get(key)
        .and_then(Value::as_i64)
        .and_then(|n| u64::try_from(n).ok())
}

fn opt_f64(attrs: &HashMap<String, Value>, key: &str) -> Option<f64> {
    attrs.get(key).and_then(Value::as_f64)
}

/// First argument in `args` whose desired value differs from the recorded one
fn find_immutable_change<'a>(
    from: &HashMap<String, Value>,
    to: &HashMap<String, Value>,
    args: &[&'a str],
) -> Option<&'a str> {
    args.iter()
        .find(|key| match (from.get(**key), to.get(**key)) {
            (Some(old), Some(new)) => old != new,
            (None, Some(_)) => true,
            _ => false,
        })
        .copied()
}

/// True when the desired value for `key` differs from the recorded state
fn changed(from: &State, to: &Resource, key: &str) -> bool {
    to.attributes
        .get(key)
        .is_some_and(|v| from.attributes.get(key) != Some(v))
}

/// Build the CreateClusters request from declared attributes.
///
/// NORMAL mode needs an instance size, SERVERLESS mode needs a cpu range;
/// both are checked here so a bad manifest fails before any remote call.
fn cluster_create_request(resource: &Resource) -> ProviderResult<cynosdb::CreateClustersRequest> {
    let attrs = &resource.attributes;
    let db_mode = opt_str(attrs, "db_mode").unwrap_or_else(|| "NORMAL".to_string());

    let mut request = cynosdb::CreateClustersRequest {
        zone: required_str(resource, "available_zone")?,
        vpc_id: required_str(resource, "vpc_id")?,
        subnet_id: required_str(resource, "subnet_id")?,
        db_type: required_str(resource, "db_type")?,
        db_version: required_str(resource, "db_version")?,
        cluster_name: required_str(resource, "cluster_name")?,
        admin_password: required_str(resource, "password")?,
        port: Some(opt_i64(attrs, "port").unwrap_or(DEFAULT_PORT)),
        project_id: Some(opt_i64(attrs, "project_id").unwrap_or(0)),
        pay_mode: Some(opt_i64(attrs, "pay_mode").unwrap_or(0)),
        instance_count: Some(1),
        rollback_strategy: Some(ROLLBACK_NONE.to_string()),
        db_mode: Some(db_mode.clone()),
        storage_limit: opt_i64(attrs, "storage_limit"),
        ..Default::default()
    };

    if db_mode == DB_MODE_SERVERLESS {
        request.min_cpu = Some(opt_f64(attrs, "min_cpu").ok_or_else(|| {
            ProviderError::new("min_cpu is required when db_mode is SERVERLESS")
        })?);
        request.max_cpu = Some(opt_f64(attrs, "max_cpu").ok_or_else(|| {
            ProviderError::new("max_cpu is required when db_mode is SERVERLESS")
        })?);
        request.auto_pause = opt_str(attrs, "auto_pause");
        request.auto_pause_delay = opt_i64(attrs, "auto_pause_delay");
    } else {
        request.cpu = Some(opt_i64(attrs, "instance_cpu_core").ok_or_else(|| {
            ProviderError::new("instance_cpu_core is required when db_mode is NORMAL")
        })?);
        request.memory = Some(opt_i64(attrs, "instance_memory_size").ok_or_else(|| {
            ProviderError::new("instance_memory_size is required when db_mode is NORMAL")
        })?);
    }

    let params = parse_param_items(attrs)?;
    if !params.is_empty() {
        request.cluster_params = Some(
            params
                .into_iter()
                .map(|(name, value)| cynosdb::ParamItem {
                    param_name: name,
                    current_value: value,
                    old_value: None,
                })
                .collect(),
        );
    }
    Ok(request)
}

/// Extract `param_items` into (name, value) pairs
fn parse_param_items(attrs: &HashMap<String, Value>) -> ProviderResult<Vec<(String, String)>> {
    let Some(items) = attrs.get("param_items").and_then(Value::as_list) else {
        return Ok(Vec::new());
    };
    let mut params = Vec::new();
    for item in items {
        let Value::Map(map) = item else {
            return Err(ProviderError::new("param_items entries must be maps"));
        };
        let name = map.get("name").and_then(Value::as_str);
        let value = map.get("current_value").and_then(Value::as_str);
        match (name, value) {
            (Some(name), Some(value)) => params.push((name.to_string(), value.to_string())),
            _ => {
                return Err(ProviderError::new(
                    "param_items entries need 'name' and 'current_value'",
                ));
            }
        }
    }
    Ok(params)
}

/// State attributes from the cluster list item and detail
fn cluster_attrs(
    cluster: &cynosdb::Cluster,
    detail: &cynosdb::ClusterDetail,
) -> HashMap<String, Value> {
    let mut attrs = HashMap::new();
    set_optional(&mut attrs, "cluster_name", detail.cluster_name.clone(), Value::String);
    set_optional(&mut attrs, "available_zone", detail.zone.clone(), Value::String);
    set_optional(&mut attrs, "vpc_id", detail.vpc_id.clone(), Value::String);
    set_optional(&mut attrs, "subnet_id", detail.subnet_id.clone(), Value::String);
    set_optional(&mut attrs, "db_type", detail.db_type.clone(), Value::String);
    set_optional(&mut attrs, "db_version", detail.db_version.clone(), Value::String);
    set_optional(&mut attrs, "db_mode", detail.db_mode.clone(), Value::String);
    set_optional(
        &mut attrs,
        "serverless_status",
        detail.serverless_status.clone(),
        Value::String,
    );
    set_optional(&mut attrs, "port", detail.vport, Value::Int);
    set_optional(&mut attrs, "charset", detail.charset.clone(), Value::String);
    set_optional(&mut attrs, "cluster_status", detail.status.clone(), Value::String);
    set_optional(&mut attrs, "create_time", detail.create_time.clone(), Value::String);
    set_optional(&mut attrs, "storage_limit", detail.storage_limit, Value::Int);
    set_optional(&mut attrs, "storage_used", detail.used_storage, Value::Int);
    set_optional(&mut attrs, "pay_mode", cluster.pay_mode, Value::Int);
    set_optional(&mut attrs, "project_id", cluster.project_id, Value::Int);

    let rw = detail
        .instance_set
        .iter()
        .find(|i| i.instance_type.as_deref() == Some(INSTANCE_TYPE_RW));
    if let Some(rw) = rw {
        set_optional(&mut attrs, "instance_id", rw.instance_id.clone(), Value::String);
        set_optional(&mut attrs, "instance_cpu_core", rw.instance_cpu, Value::Int);
        set_optional(&mut attrs, "instance_memory_size", rw.instance_memory, Value::Int);
    }
    attrs
}

/// Carry declared attributes the API never echoes (passwords, flags,
/// parameter lists) into the returned state so the next plan sees them as
/// settled. Values actually read from the API win.
fn merge_declared(resource: &Resource, mut state: State) -> State {
    if !state.exists {
        return state;
    }
    for (key, value) in &resource.attributes {
        state
            .attributes
            .entry(key.clone())
            .or_insert_with(|| value.clone());
    }
    state
}

fn machine_to_value(machine: cwp::Machine) -> Value {
    let mut map = HashMap::new();
    set_optional(&mut map, "machine_name", machine.machine_name, Value::String);
    set_optional(&mut map, "machine_os", machine.machine_os, Value::String);
    set_optional(&mut map, "machine_status", machine.machine_status, Value::String);
    set_optional(&mut map, "uuid", machine.uuid, Value::String);
    set_optional(&mut map, "quuid", machine.quuid, Value::String);
    set_optional(&mut map, "machine_ip", machine.machine_ip, Value::String);
    set_optional(&mut map, "machine_wan_ip", machine.machine_wan_ip, Value::String);
    set_optional(&mut map, "machine_type", machine.machine_type, Value::String);
    set_optional(&mut map, "is_pro_version", machine.is_pro_version, Value::Bool);
    set_optional(&mut map, "pay_mode", machine.pay_mode, Value::String);
    set_optional(&mut map, "project_id", machine.project_id, Value::Int);
    set_optional(&mut map, "instance_state", machine.instance_state, Value::String);
    if let Some(region_info) = machine.region_info {
        set_optional(&mut map, "region", region_info.region, Value::String);
        set_optional(&mut map, "region_name", region_info.region_name, Value::String);
    }
    Value::Map(map)
}

fn cluster_to_value(cluster: cynosdb::Cluster) -> Value {
    let mut map = HashMap::new();
    set_optional(&mut map, "cluster_id", cluster.cluster_id, Value::String);
    set_optional(&mut map, "cluster_name", cluster.cluster_name, Value::String);
    set_optional(&mut map, "cluster_status", cluster.status, Value::String);
    set_optional(&mut map, "available_zone", cluster.zone, Value::String);
    set_optional(&mut map, "db_type", cluster.db_type, Value::String);
    set_optional(&mut map, "db_version", cluster.db_version, Value::String);
    set_optional(&mut map, "db_mode", cluster.db_mode, Value::String);
    set_optional(
        &mut map,
        "serverless_status",
        cluster.serverless_status,
        Value::String,
    );
    set_optional(&mut map, "vpc_id", cluster.vpc_id, Value::String);
    set_optional(&mut map, "subnet_id", cluster.subnet_id, Value::String);
    set_optional(&mut map, "port", cluster.vport, Value::Int);
    set_optional(&mut map, "pay_mode", cluster.pay_mode, Value::Int);
    set_optional(&mut map, "project_id", cluster.project_id, Value::Int);
    set_optional(&mut map, "create_time", cluster.create_time, Value::String);
    set_optional(&mut map, "storage_limit", cluster.storage_limit, Value::Int);
    set_optional(&mut map, "instance_num", cluster.instance_num, Value::Int);
    Value::Map(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster_resource() -> Resource {
        Resource::new("cynosdb.cluster", "orders")
            .with_attribute("cluster_name", Value::String("orders".to_string()))
            .with_attribute("available_zone", Value::String("ap-guangzhou-3".to_string()))
            .with_attribute("vpc_id", Value::String("vpc-h70b6b49".to_string()))
            .with_attribute("subnet_id", Value::String("subnet-q6fhy1mi".to_string()))
            .with_attribute("db_type", Value::String("MYSQL".to_string()))
            .with_attribute("db_version", Value::String("5.7".to_string()))
            .with_attribute("password", Value::String("cynos2024pw".to_string()))
    }

    #[test]
    fn normal_cluster_request_defaults() {
        let resource = cluster_resource()
            .with_attribute("instance_cpu_core", Value::Int(2))
            .with_attribute("instance_memory_size", Value::Int(4));

        let request = cluster_create_request(&resource).unwrap();
        assert_eq!(request.port, Some(5432));
        assert_eq!(request.pay_mode, Some(0));
        assert_eq!(request.rollback_strategy.as_deref(), Some("noneRollback"));
        assert_eq!(request.cpu, Some(2));
        assert_eq!(request.memory, Some(4));
        assert_eq!(request.min_cpu, None);
        assert_eq!(request.cluster_params, None);
    }

    #[test]
    fn serverless_cluster_request_needs_cpu_range() {
        let resource =
            cluster_resource().with_attribute("db_mode", Value::String("SERVERLESS".to_string()));
        let err = cluster_create_request(&resource).unwrap_err();
        assert!(err.to_string().contains("min_cpu"));

        let resource = cluster_resource()
            .with_attribute("db_mode", Value::String("SERVERLESS".to_string()))
            .with_attribute("min_cpu", Value::Float(0.25))
            .with_attribute("max_cpu", Value::Int(2));
        let request = cluster_create_request(&resource).unwrap();
        assert_eq!(request.min_cpu, Some(0.25));
        assert_eq!(request.max_cpu, Some(2.0));
        assert_eq!(request.cpu, None);
    }

    #[test]
    fn missing_required_attribute_is_an_immediate_error() {
        let mut resource = cluster_resource();
        resource.attributes.remove("vpc_id");

        let err = cluster_create_request(&resource).unwrap_err();
        assert!(err.to_string().contains("vpc_id"));
    }

    #[test]
    fn immutable_change_is_named() {
        let mut from = HashMap::new();
        from.insert("db_mode".to_string(), Value::String("NORMAL".to_string()));
        let mut to = from.clone();
        assert_eq!(find_immutable_change(&from, &to, IMMUTABLE_CLUSTER_ARGS), None);

        to.insert("db_mode".to_string(), Value::String("SERVERLESS".to_string()));
        assert_eq!(
            find_immutable_change(&from, &to, IMMUTABLE_CLUSTER_ARGS),
            Some("db_mode")
        );

        // Introducing an immutable argument counts as a change
        let mut added = from.clone();
        added.insert("min_cpu".to_string(), Value::Float(0.5));
        assert_eq!(
            find_immutable_change(&from, &added, IMMUTABLE_CLUSTER_ARGS),
            Some("min_cpu")
        );
    }

    #[test]
    fn param_items_parse_and_reject_malformed() {
        let mut item = HashMap::new();
        item.insert(
            "name".to_string(),
            Value::String("character_set_server".to_string()),
        );
        item.insert("current_value".to_string(), Value::String("utf8mb4".to_string()));
        let mut attrs = HashMap::new();
        attrs.insert("param_items".to_string(), Value::List(vec![Value::Map(item)]));

        let params = parse_param_items(&attrs).unwrap();
        assert_eq!(
            params,
            vec![("character_set_server".to_string(), "utf8mb4".to_string())]
        );

        let mut bad = HashMap::new();
        bad.insert("name".to_string(), Value::String("max_connections".to_string()));
        attrs.insert("param_items".to_string(), Value::List(vec![Value::Map(bad)]));
        assert!(parse_param_items(&attrs).is_err());
    }

    #[test]
    fn merge_declared_fills_gaps_only() {
        let resource = cluster_resource();
        let id = resource.id.clone();
        let mut read_attrs = HashMap::new();
        read_attrs.insert(
            "cluster_name".to_string(),
            Value::String("orders-renamed".to_string()),
        );
        let state = State::existing(id, read_attrs).with_identifier("cynosdbmysql-bzs467r3");

        let merged = merge_declared(&resource, state);
        // API value wins, declared password is carried
        assert_eq!(
            merged.attributes.get("cluster_name"),
            Some(&Value::String("orders-renamed".to_string()))
        );
        assert_eq!(
            merged.attributes.get("password"),
            Some(&Value::String("cynos2024pw".to_string()))
        );
    }

    #[test]
    fn cluster_attrs_pick_the_rw_instance() {
        let cluster = cynosdb::Cluster {
            pay_mode: Some(0),
            project_id: Some(0),
            ..Default::default()
        };
        let detail = cynosdb::ClusterDetail {
            cluster_name: Some("orders".to_string()),
            vport: Some(5432),
            instance_set: vec![
                cynosdb::ClusterInstanceDetail {
                    instance_id: Some("cynosdbmysql-ins-ro1".to_string()),
                    instance_type: Some("ro".to_string()),
                    instance_cpu: Some(1),
                    instance_memory: Some(2),
                    ..Default::default()
                },
                cynosdb::ClusterInstanceDetail {
                    instance_id: Some("cynosdbmysql-ins-rw1".to_string()),
                    instance_type: Some("rw".to_string()),
                    instance_cpu: Some(2),
                    instance_memory: Some(4),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };

        let attrs = cluster_attrs(&cluster, &detail);
        assert_eq!(
            attrs.get("instance_id"),
            Some(&Value::String("cynosdbmysql-ins-rw1".to_string()))
        );
        assert_eq!(attrs.get("instance_cpu_core"), Some(&Value::Int(2)));
        assert_eq!(attrs.get("port"), Some(&Value::Int(5432)));
    }

    #[test]
    fn machine_values_keep_region_fields() {
        let machine = cwp::Machine {
            machine_name: Some("web-1".to_string()),
            quuid: Some("2c2c42c2-6c4a-4f24-b776-0a9f6e9f84c0".to_string()),
            region_info: Some(cwp::RegionInfo {
                region: Some("ap-guangzhou".to_string()),
                region_name: Some("Guangzhou".to_string()),
                region_id: Some(1),
            }),
            ..Default::default()
        };

        let Value::Map(map) = machine_to_value(machine) else {
            panic!("expected a map");
        };
        assert_eq!(
            map.get("region"),
            Some(&Value::String("ap-guangzhou".to_string()))
        );
        assert_eq!(map.get("machine_name"), Some(&Value::String("web-1".to_string())));
    }

    fn offline_provider() -> TencentCloudProvider {
        TencentCloudProvider::with_client(TencentClient::new(
            Credential::new("id", "key"),
            "ap-guangzhou",
        ))
    }

    #[test]
    fn resource_types_match_published_schemas() {
        let provider = offline_provider();

        let mut type_names: Vec<&str> =
            provider.resource_types().iter().map(|t| t.name()).collect();
        let mut schema_names: Vec<String> = schemas::all_schemas()
            .into_iter()
            .map(|s| s.resource_type)
            .collect();
        type_names.sort_unstable();
        schema_names.sort();

        assert_eq!(type_names, schema_names);
    }

    // The dispatch paths below all fail before any request is built, so they
    // run against a client with dummy credentials.

    #[tokio::test]
    async fn read_without_identifier_is_not_found() {
        let provider = offline_provider();
        let id = ResourceId::new("cynosdb.cluster", "main");

        let state = provider.read(&id, None).await.unwrap();
        assert!(!state.exists);
        assert_eq!(state.identifier, None);
    }

    #[tokio::test]
    async fn read_with_malformed_identifier_reports_broken_id() {
        let provider = offline_provider();
        let id = ResourceId::new("cynosdb.account", "app");

        let err = provider
            .read(&id, Some("cynosdbmysql-bzs467r3#app_user"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("id is broken"), "got: {}", err);
        assert!(err.to_string().contains("cynosdb.account.app"));
    }

    #[tokio::test]
    async fn data_sources_cannot_be_created() {
        let provider = offline_provider();
        let resource = Resource::new("cwp.machines", "all");

        let err = provider.create(&resource).await.unwrap_err();
        assert!(err.to_string().contains("data source"), "got: {}", err);
    }

    #[tokio::test]
    async fn query_rejects_managed_resource_types() {
        let provider = offline_provider();
        let resource = cluster_resource();

        let err = provider.query(&resource).await.unwrap_err();
        assert!(err.to_string().contains("not a data source"), "got: {}", err);
    }

    #[tokio::test]
    async fn unknown_resource_type_is_rejected() {
        let provider = offline_provider();
        let id = ResourceId::new("cynosdb.proxy", "edge");

        let err = provider.read(&id, Some("cynosdbmysql-bzs467r3")).await.unwrap_err();
        assert!(err.to_string().contains("Unknown resource type"));
    }
}
