//! CynosDB (TDSQL-C MySQL) API models and calls
//!
//! Request fields are Options serialized with skip_serializing_if, so an
//! unset field is omitted from the JSON body entirely rather than sent as
//! null. The API treats absent and null differently for several fields.

use serde::{Deserialize, Serialize};

use crate::client::TencentClient;
use crate::error::Result;

const SERVICE: &str = "cynosdb";
const VERSION: &str = "2019-01-07";

// ========== Shared Types ==========

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct QueryFilter {
    pub names: Vec<String>,
    pub values: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exact_match: Option<bool>,
}

impl QueryFilter {
    pub fn exact(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            names: vec![name.into()],
            values: vec![value.into()],
            exact_match: Some(true),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ParamItem {
    pub param_name: String,
    pub current_value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_value: Option<String>,
}

/// Empty response body; the envelope's RequestId is handled by the client
#[derive(Debug, Clone, Deserialize, Default)]
pub struct EmptyResponse {}

// ========== Cluster Lifecycle ==========

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct CreateClustersRequest {
    pub zone: String,
    pub vpc_id: String,
    pub subnet_id: String,
    pub db_type: String,
    pub db_version: String,
    pub cluster_name: String,
    pub admin_password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pay_mode: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rollback_strategy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_cpu: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_cpu: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_pause: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_pause_delay: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_limit: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_params: Option<Vec<ParamItem>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct CreateClustersResponse {
    #[serde(default)]
    pub deal_names: Vec<String>,
    #[serde(default)]
    pub resource_ids: Vec<String>,
    #[serde(default)]
    pub cluster_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeResourcesByDealNameRequest {
    pub deal_name: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeResourcesByDealNameResponse {
    #[serde(default)]
    pub billing_resource_infos: Vec<BillingResourceInfo>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BillingResourceInfo {
    pub cluster_id: Option<String>,
    #[serde(default)]
    pub instance_ids: Vec<String>,
    pub deal_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeClustersRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<Vec<QueryFilter>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeClustersResponse {
    pub total_count: Option<i64>,
    #[serde(default)]
    pub cluster_set: Vec<Cluster>,
}

/// Cluster as returned by DescribeClusters
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct Cluster {
    pub cluster_id: Option<String>,
    pub cluster_name: Option<String>,
    pub status: Option<String>,
    pub zone: Option<String>,
    pub db_type: Option<String>,
    pub db_version: Option<String>,
    pub db_mode: Option<String>,
    pub serverless_status: Option<String>,
    pub vpc_id: Option<String>,
    pub subnet_id: Option<String>,
    pub vport: Option<i64>,
    pub pay_mode: Option<i64>,
    // The list API spells this one differently from the request side
    #[serde(rename = "ProjectID")]
    pub project_id: Option<i64>,
    pub create_time: Option<String>,
    pub storage_limit: Option<i64>,
    pub used_storage: Option<i64>,
    pub renew_flag: Option<i64>,
    pub instance_num: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeClusterDetailRequest {
    pub cluster_id: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeClusterDetailResponse {
    pub detail: Option<ClusterDetail>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct ClusterDetail {
    pub cluster_id: Option<String>,
    pub cluster_name: Option<String>,
    pub status: Option<String>,
    pub status_desc: Option<String>,
    pub zone: Option<String>,
    pub vpc_id: Option<String>,
    pub subnet_id: Option<String>,
    pub db_type: Option<String>,
    pub db_version: Option<String>,
    pub db_mode: Option<String>,
    pub serverless_status: Option<String>,
    pub vport: Option<i64>,
    pub charset: Option<String>,
    pub create_time: Option<String>,
    pub storage_limit: Option<i64>,
    pub used_storage: Option<i64>,
    #[serde(default)]
    pub instance_set: Vec<ClusterInstanceDetail>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct ClusterInstanceDetail {
    pub instance_id: Option<String>,
    pub instance_name: Option<String>,
    pub instance_type: Option<String>,
    pub instance_status: Option<String>,
    pub instance_cpu: Option<i64>,
    pub instance_memory: Option<i64>,
    pub instance_storage: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct IsolateClusterRequest {
    pub cluster_id: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct IsolateClusterResponse {
    pub flow_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct OfflineClusterRequest {
    pub cluster_id: String,
}

// ========== Cluster Modification ==========

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModifyClusterNameRequest {
    pub cluster_id: String,
    pub cluster_name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModifyClusterStorageRequest {
    pub cluster_id: String,
    pub new_storage_limit: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_storage_limit: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deal_mode: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct UpgradeInstanceRequest {
    pub instance_id: String,
    pub cpu: i64,
    pub memory: i64,
    pub upgrade_type: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModifyClusterParamRequest {
    pub cluster_id: String,
    pub param_list: Vec<ParamItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_in_maintain_period: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct ModifyClusterParamResponse {
    pub async_request_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeClusterParamsRequest {
    pub cluster_id: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeClusterParamsResponse {
    #[serde(default)]
    pub items: Vec<ParamInfo>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ParamInfo {
    pub param_name: Option<String>,
    pub current_value: Option<String>,
    pub default: Option<String>,
}

// ========== Slave Zones ==========

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AddClusterSlaveZoneRequest {
    pub cluster_id: String,
    pub slave_zone: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RemoveClusterSlaveZoneRequest {
    pub cluster_id: String,
    pub slave_zone: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModifyClusterSlaveZoneRequest {
    pub cluster_id: String,
    pub old_slave_zone: String,
    pub new_slave_zone: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct FlowResponse {
    pub flow_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeFlowRequest {
    pub flow_id: i64,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeFlowResponse {
    pub status: Option<i64>,
}

// ========== Serverless ==========

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PauseServerlessRequest {
    pub cluster_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub force_pause: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResumeServerlessRequest {
    pub cluster_id: String,
}

// ========== Accounts ==========

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct NewAccount {
    pub account_name: String,
    pub account_password: String,
    pub host: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateAccountsRequest {
    pub cluster_id: String,
    pub accounts: Vec<NewAccount>,
}

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeAccountsRequest {
    pub cluster_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_names: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hosts: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeAccountsResponse {
    pub total_count: Option<i64>,
    #[serde(default)]
    pub account_set: Vec<Account>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct Account {
    pub account_name: Option<String>,
    pub host: Option<String>,
    pub description: Option<String>,
    pub create_time: Option<String>,
    pub update_time: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModifyAccountDescriptionRequest {
    pub cluster_id: String,
    pub account_name: String,
    pub host: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResetAccountPasswordRequest {
    pub cluster_id: String,
    pub account_name: String,
    pub account_password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct InputAccount {
    pub account_name: String,
    pub host: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeleteAccountsRequest {
    pub cluster_id: String,
    pub accounts: Vec<InputAccount>,
}

// ========== Async Request Info ==========

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeAsyncRequestInfoRequest {
    pub async_request_id: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeAsyncRequestInfoResponse {
    pub status: Option<String>,
    pub info: Option<String>,
}

// ========== Client Methods ==========

impl TencentClient {
    pub async fn create_clusters(
        &self,
        request: &CreateClustersRequest,
    ) -> Result<CreateClustersResponse> {
        self.call(SERVICE, VERSION, "CreateClusters", request).await
    }

    pub async fn describe_resources_by_deal_name(
        &self,
        request: &DescribeResourcesByDealNameRequest,
    ) -> Result<DescribeResourcesByDealNameResponse> {
        self.call(SERVICE, VERSION, "DescribeResourcesByDealName", request)
            .await
    }

    pub async fn describe_clusters(
        &self,
        request: &DescribeClustersRequest,
    ) -> Result<DescribeClustersResponse> {
        self.call(SERVICE, VERSION, "DescribeClusters", request).await
    }

    pub async fn describe_cluster_detail(
        &self,
        request: &DescribeClusterDetailRequest,
    ) -> Result<DescribeClusterDetailResponse> {
        self.call(SERVICE, VERSION, "DescribeClusterDetail", request)
            .await
    }

    pub async fn isolate_cluster(
        &self,
        request: &IsolateClusterRequest,
    ) -> Result<IsolateClusterResponse> {
        self.call(SERVICE, VERSION, "IsolateCluster", request).await
    }

    pub async fn offline_cluster(&self, request: &OfflineClusterRequest) -> Result<EmptyResponse> {
        self.call(SERVICE, VERSION, "OfflineCluster", request).await
    }

    pub async fn modify_cluster_name(
        &self,
        request: &ModifyClusterNameRequest,
    ) -> Result<EmptyResponse> {
        self.call(SERVICE, VERSION, "ModifyClusterName", request).await
    }

    pub async fn modify_cluster_storage(
        &self,
        request: &ModifyClusterStorageRequest,
    ) -> Result<EmptyResponse> {
        self.call(SERVICE, VERSION, "ModifyClusterStorage", request)
            .await
    }

    pub async fn upgrade_instance(&self, request: &UpgradeInstanceRequest) -> Result<EmptyResponse> {
        self.call(SERVICE, VERSION, "UpgradeInstance", request).await
    }

    pub async fn modify_cluster_param(
        &self,
        request: &ModifyClusterParamRequest,
    ) -> Result<ModifyClusterParamResponse> {
        self.call(SERVICE, VERSION, "ModifyClusterParam", request).await
    }

    pub async fn describe_cluster_params(
        &self,
        request: &DescribeClusterParamsRequest,
    ) -> Result<DescribeClusterParamsResponse> {
        self.call(SERVICE, VERSION, "DescribeClusterParams", request)
            .await
    }

    pub async fn add_cluster_slave_zone(
        &self,
        request: &AddClusterSlaveZoneRequest,
    ) -> Result<FlowResponse> {
        self.call(SERVICE, VERSION, "AddClusterSlaveZone", request)
            .await
    }

    pub async fn remove_cluster_slave_zone(
        &self,
        request: &RemoveClusterSlaveZoneRequest,
    ) -> Result<FlowResponse> {
        self.call(SERVICE, VERSION, "RemoveClusterSlaveZone", request)
            .await
    }

    pub async fn modify_cluster_slave_zone(
        &self,
        request: &ModifyClusterSlaveZoneRequest,
    ) -> Result<FlowResponse> {
        self.call(SERVICE, VERSION, "ModifyClusterSlaveZone", request)
            .await
    }

    pub async fn describe_flow(&self, request: &DescribeFlowRequest) -> Result<DescribeFlowResponse> {
        self.call(SERVICE, VERSION, "DescribeFlow", request).await
    }

    pub async fn pause_serverless(&self, request: &PauseServerlessRequest) -> Result<EmptyResponse> {
        self.call(SERVICE, VERSION, "PauseServerless", request).await
    }

    pub async fn resume_serverless(
        &self,
        request: &ResumeServerlessRequest,
    ) -> Result<EmptyResponse> {
        self.call(SERVICE, VERSION, "ResumeServerless", request).await
    }

    pub async fn create_accounts(&self, request: &CreateAccountsRequest) -> Result<EmptyResponse> {
        self.call(SERVICE, VERSION, "CreateAccounts", request).await
    }

    pub async fn describe_accounts(
        &self,
        request: &DescribeAccountsRequest,
    ) -> Result<DescribeAccountsResponse> {
        self.call(SERVICE, VERSION, "DescribeAccounts", request).await
    }

    pub async fn modify_account_description(
        &self,
        request: &ModifyAccountDescriptionRequest,
    ) -> Result<EmptyResponse> {
        self.call(SERVICE, VERSION, "ModifyAccountDescription", request)
            .await
    }

    pub async fn reset_account_password(
        &self,
        request: &ResetAccountPasswordRequest,
    ) -> Result<EmptyResponse> {
        self.call(SERVICE, VERSION, "ResetAccountPassword", request)
            .await
    }

    pub async fn delete_accounts(&self, request: &DeleteAccountsRequest) -> Result<EmptyResponse> {
        self.call(SERVICE, VERSION, "DeleteAccounts", request).await
    }

    /// Parameter tasks report through the cdb endpoint, not cynosdb
    pub async fn describe_async_request_info(
        &self,
        request: &DescribeAsyncRequestInfoRequest,
    ) -> Result<DescribeAsyncRequestInfoResponse> {
        self.call("cdb", "2017-03-20", "DescribeAsyncRequestInfo", request)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_fields_are_omitted_from_the_body() {
        let request = CreateClustersRequest {
            zone: "ap-guangzhou-3".to_string(),
            vpc_id: "vpc-1yg5ua6l".to_string(),
            subnet_id: "subnet-9tpab3tx".to_string(),
            db_type: "MYSQL".to_string(),
            db_version: "5.7".to_string(),
            cluster_name: "demo".to_string(),
            admin_password: "Qwer1234!".to_string(),
            port: Some(3306),
            pay_mode: Some(0),
            instance_count: Some(1),
            ..Default::default()
        };

        let body = serde_json::to_value(&request).unwrap();
        let object = body.as_object().unwrap();
        assert_eq!(object["Zone"], "ap-guangzhou-3");
        assert_eq!(object["Port"], 3306);
        // Serverless knobs were never set, so they must not be present
        assert!(!object.contains_key("MinCpu"));
        assert!(!object.contains_key("MaxCpu"));
        assert!(!object.contains_key("AutoPause"));
        assert!(!object.contains_key("StorageLimit"));
    }

    #[test]
    fn cluster_list_item_deserializes() {
        let json = serde_json::json!({
            "ClusterId": "cynosdbmysql-bzs467r3",
            "ClusterName": "demo",
            "Status": "running",
            "Zone": "ap-guangzhou-3",
            "DbMode": "SERVERLESS",
            "ServerlessStatus": "resume",
            "ProjectID": 0,
            "Vport": 3306,
            "InstanceNum": 1
        });

        let cluster: Cluster = serde_json::from_value(json).unwrap();
        assert_eq!(cluster.cluster_id.as_deref(), Some("cynosdbmysql-bzs467r3"));
        assert_eq!(cluster.status.as_deref(), Some("running"));
        assert_eq!(cluster.project_id, Some(0));
        assert_eq!(cluster.vport, Some(3306));
    }

    #[test]
    fn missing_arrays_decode_as_empty() {
        let response: CreateClustersResponse =
            serde_json::from_value(serde_json::json!({"RequestId": "x"})).unwrap();
        assert!(response.deal_names.is_empty());
    }

    #[test]
    fn exact_filter_shape() {
        let filter = QueryFilter::exact("ClusterId", "cynosdbmysql-bzs467r3");
        let body = serde_json::to_value(&filter).unwrap();
        assert_eq!(body["Names"][0], "ClusterId");
        assert_eq!(body["Values"][0], "cynosdbmysql-bzs467r3");
        assert_eq!(body["ExactMatch"], true);
    }
}
