//! CWP (host security) API models and calls
//!
//! Covers machine listing plus license orders and license binding. CWP
//! filters use a single Name per filter, unlike the CynosDB QueryFilter.

use serde::{Deserialize, Serialize};

use crate::client::TencentClient;
use crate::cynosdb::EmptyResponse;
use crate::error::Result;

const SERVICE: &str = "cwp";
const VERSION: &str = "2018-02-28";

// ========== Shared Types ==========

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct Filter {
    pub name: String,
    pub values: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exact_match: Option<bool>,
}

impl Filter {
    pub fn new(name: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            name: name.into(),
            values,
            exact_match: None,
        }
    }
}

// ========== Machines ==========

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeMachinesRequest {
    pub machine_type: String,
    pub machine_region: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<Vec<Filter>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_ids: Option<Vec<u64>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeMachinesResponse {
    pub total_count: Option<i64>,
    #[serde(default)]
    pub machines: Vec<Machine>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct Machine {
    pub machine_name: Option<String>,
    pub machine_os: Option<String>,
    pub machine_status: Option<String>,
    pub uuid: Option<String>,
    pub quuid: Option<String>,
    pub machine_ip: Option<String>,
    pub machine_wan_ip: Option<String>,
    pub machine_type: Option<String>,
    pub is_pro_version: Option<bool>,
    pub pay_mode: Option<String>,
    pub project_id: Option<i64>,
    pub instance_state: Option<String>,
    pub region_info: Option<RegionInfo>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct RegionInfo {
    pub region: Option<String>,
    pub region_name: Option<String>,
    pub region_id: Option<i64>,
}

// ========== License Orders ==========

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct CreateLicenseOrderRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license_type: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license_num: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct CreateLicenseOrderResponse {
    #[serde(default)]
    pub deal_names: Vec<String>,
    #[serde(default)]
    pub resource_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeLicenseListRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<Vec<Filter>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeLicenseListResponse {
    pub total_count: Option<i64>,
    #[serde(default)]
    pub list: Vec<LicenseDetail>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct LicenseDetail {
    pub resource_id: Option<String>,
    pub license_id: Option<u64>,
    pub license_type: Option<u64>,
    pub license_cnt: Option<u64>,
    pub used_license_cnt: Option<u64>,
    pub license_status: Option<i64>,
    pub buy_time: Option<String>,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModifyLicenseOrderRequest {
    pub resource_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inquire_num: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct ModifyLicenseOrderResponse {
    #[serde(default)]
    pub deal_names: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DestroyOrderRequest {
    pub resource_id: String,
}

// ========== License Binding ==========

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModifyLicenseBindsRequest {
    pub resource_id: String,
    pub license_type: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_all_bound: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quuid_list: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct ModifyLicenseBindsResponse {
    pub task_id: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModifyLicenseUnBindsRequest {
    pub resource_id: String,
    pub license_type: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_all_bound: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quuid_list: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeLicenseBindScheduleRequest {
    pub task_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<Vec<Filter>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeLicenseBindScheduleResponse {
    #[serde(default)]
    pub list: Vec<LicenseBindTaskDetail>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct LicenseBindTaskDetail {
    pub quuid: Option<String>,
    pub machine_name: Option<String>,
    /// 0 binding, 1 bound, 2 failed
    pub status: Option<i64>,
    pub err_msg: Option<String>,
}

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeLicenseBindListRequest {
    pub resource_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<Vec<Filter>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeLicenseBindListResponse {
    pub total_count: Option<i64>,
    #[serde(default)]
    pub list: Vec<LicenseBindDetail>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct LicenseBindDetail {
    pub machine_name: Option<String>,
    pub machine_wan_ip: Option<String>,
    pub quuid: Option<String>,
    pub agent_status: Option<String>,
    pub is_un_bind: Option<bool>,
}

// ========== Client Methods ==========

impl TencentClient {
    pub async fn describe_machines(
        &self,
        request: &DescribeMachinesRequest,
    ) -> Result<DescribeMachinesResponse> {
        self.call(SERVICE, VERSION, "DescribeMachines", request).await
    }

    pub async fn create_license_order(
        &self,
        request: &CreateLicenseOrderRequest,
    ) -> Result<CreateLicenseOrderResponse> {
        self.call(SERVICE, VERSION, "CreateLicenseOrder", request)
            .await
    }

    pub async fn describe_license_list(
        &self,
        request: &DescribeLicenseListRequest,
    ) -> Result<DescribeLicenseListResponse> {
        self.call(SERVICE, VERSION, "DescribeLicenseList", request)
            .await
    }

    pub async fn modify_license_order(
        &self,
        request: &ModifyLicenseOrderRequest,
    ) -> Result<ModifyLicenseOrderResponse> {
        self.call(SERVICE, VERSION, "ModifyLicenseOrder", request)
            .await
    }

    pub async fn destroy_order(&self, request: &DestroyOrderRequest) -> Result<EmptyResponse> {
        self.call(SERVICE, VERSION, "DestroyOrder", request).await
    }

    pub async fn modify_license_binds(
        &self,
        request: &ModifyLicenseBindsRequest,
    ) -> Result<ModifyLicenseBindsResponse> {
        self.call(SERVICE, VERSION, "ModifyLicenseBinds", request)
            .await
    }

    pub async fn modify_license_un_binds(
        &self,
        request: &ModifyLicenseUnBindsRequest,
    ) -> Result<EmptyResponse> {
        self.call(SERVICE, VERSION, "ModifyLicenseUnBinds", request)
            .await
    }

    pub async fn describe_license_bind_schedule(
        &self,
        request: &DescribeLicenseBindScheduleRequest,
    ) -> Result<DescribeLicenseBindScheduleResponse> {
        self.call(SERVICE, VERSION, "DescribeLicenseBindSchedule", request)
            .await
    }

    pub async fn describe_license_bind_list(
        &self,
        request: &DescribeLicenseBindListRequest,
    ) -> Result<DescribeLicenseBindListResponse> {
        self.call(SERVICE, VERSION, "DescribeLicenseBindList", request)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn machine_filter_shape() {
        let request = DescribeMachinesRequest {
            machine_type: "CVM".to_string(),
            machine_region: "ap-guangzhou".to_string(),
            limit: Some(100),
            offset: Some(0),
            filters: Some(vec![Filter::new(
                "Keywords",
                vec!["web-server".to_string()],
            )]),
            ..Default::default()
        };

        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["MachineType"], "CVM");
        assert_eq!(body["MachineRegion"], "ap-guangzhou");
        assert_eq!(body["Filters"][0]["Name"], "Keywords");
        assert_eq!(body["Filters"][0]["Values"][0], "web-server");
        assert!(!body.as_object().unwrap().contains_key("ProjectIds"));
    }

    #[test]
    fn machine_deserializes_with_region_info() {
        let json = serde_json::json!({
            "MachineName": "web-server-1",
            "MachineOs": "TencentOS Server 3.1",
            "MachineStatus": "ONLINE",
            "Quuid": "a6b1c2d3-0000-0000-0000-000000000000",
            "Uuid": "a6b1c2d3-1111-1111-1111-111111111111",
            "MachineIp": "10.0.0.5",
            "IsProVersion": true,
            "RegionInfo": {"Region": "gz", "RegionName": "Guangzhou", "RegionId": 1}
        });

        let machine: Machine = serde_json::from_value(json).unwrap();
        assert_eq!(machine.machine_name.as_deref(), Some("web-server-1"));
        assert_eq!(machine.is_pro_version, Some(true));
        let region = machine.region_info.unwrap();
        assert_eq!(region.region.as_deref(), Some("gz"));
    }

    #[test]
    fn bind_schedule_status_decodes() {
        let json = serde_json::json!({
            "List": [
                {"Quuid": "q-1", "MachineName": "web-server-1", "Status": 1},
                {"Quuid": "q-2", "MachineName": "web-server-2", "Status": 2, "ErrMsg": "agent offline"}
            ]
        });

        let response: DescribeLicenseBindScheduleResponse = serde_json::from_value(json).unwrap();
        assert_eq!(response.list.len(), 2);
        assert_eq!(response.list[0].status, Some(1));
        assert_eq!(response.list[1].err_msg.as_deref(), Some("agent offline"));
    }
}
