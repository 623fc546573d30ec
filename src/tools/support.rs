//! 一线客服操作工具（操作助手使用）
//!
//! 账户与工单相关的能力；业务后端不在本系统范围内，这里只校验参数并返回结构化的受理结果。

use std::collections::HashMap;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::core::ToolError;
use crate::tools::schema::{parameters_for, parse_args};
use crate::tools::Tool;

fn require_non_empty(field: &str, value: &str) -> Result<(), ToolError> {
    if value.trim().is_empty() {
        return Err(ToolError::InvalidArguments(format!("{field} must not be empty")));
    }
    Ok(())
}

#[derive(Deserialize, JsonSchema)]
struct UsernameArgs {
    /// 用户名
    username: String,
}

/// 重置密码：向用户发送重置链接
pub struct ResetPasswordTool;

#[async_trait]
impl Tool for ResetPasswordTool {
    fn name(&self) -> &str {
        "reset_user_password"
    }

    fn description(&self) -> &str {
        "Reset a customer's password given their username. This emails the user a link they can follow to choose a new password."
    }

    fn parameters_schema(&self) -> Value {
        parameters_for::<UsernameArgs>()
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let args: UsernameArgs = parse_args(args)?;
        require_non_empty("username", &args.username)?;
        Ok(json!({ "status": "success", "username": args.username }))
    }
}

#[derive(Deserialize, JsonSchema)]
struct TicketArgs {
    username: String,
    /// 问题描述
    issue: String,
}

/// 创建支持工单
pub struct CreateTicketTool;

#[async_trait]
impl Tool for CreateTicketTool {
    fn name(&self) -> &str {
        "create_support_ticket"
    }

    fn description(&self) -> &str {
        "Create a new support ticket for a user issue."
    }

    fn parameters_schema(&self) -> Value {
        parameters_for::<TicketArgs>()
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let args: TicketArgs = parse_args(args)?;
        require_non_empty("username", &args.username)?;
        require_non_empty("issue", &args.issue)?;
        let ticket_id = format!("TCK-{}", &uuid::Uuid::new_v4().simple().to_string()[..8]);
        Ok(json!({ "ticket_id": ticket_id, "status": "created", "username": args.username }))
    }
}

#[derive(Deserialize, JsonSchema)]
struct OrderArgs {
    username: String,
    order_id: String,
}

/// 查询订单状态
pub struct OrderStatusTool;

#[async_trait]
impl Tool for OrderStatusTool {
    fn name(&self) -> &str {
        "check_order_status"
    }

    fn description(&self) -> &str {
        "Look up the status of an order by its order ID."
    }

    fn parameters_schema(&self) -> Value {
        parameters_for::<OrderArgs>()
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let args: OrderArgs = parse_args(args)?;
        require_non_empty("order_id", &args.order_id)?;
        Ok(json!({ "order_id": args.order_id, "username": args.username, "status": "pending" }))
    }
}

#[derive(Deserialize, JsonSchema)]
struct ProfileArgs {
    username: String,
    /// 需要修改的字段及新值
    profile_updates: HashMap<String, Value>,
}

/// 更新用户资料
pub struct UpdateProfileTool;

#[async_trait]
impl Tool for UpdateProfileTool {
    fn name(&self) -> &str {
        "update_user_profile"
    }

    fn description(&self) -> &str {
        "Update fields on a user's profile."
    }

    fn parameters_schema(&self) -> Value {
        parameters_for::<ProfileArgs>()
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let args: ProfileArgs = parse_args(args)?;
        require_non_empty("username", &args.username)?;
        if args.profile_updates.is_empty() {
            return Err(ToolError::InvalidArguments(
                "profile_updates must contain at least one field".to_string(),
            ));
        }
        let mut fields: Vec<&String> = args.profile_updates.keys().collect();
        fields.sort();
        Ok(json!({ "status": "success", "updated_fields": fields }))
    }
}

#[derive(Deserialize, JsonSchema)]
struct EmailArgs {
    username: String,
    email_body: String,
}

/// 发送跟进邮件
pub struct FollowupEmailTool;

#[async_trait]
impl Tool for FollowupEmailTool {
    fn name(&self) -> &str {
        "send_followup_email"
    }

    fn description(&self) -> &str {
        "Send a follow-up email to a user when something important was changed for them in the system."
    }

    fn parameters_schema(&self) -> Value {
        parameters_for::<EmailArgs>()
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let args: EmailArgs = parse_args(args)?;
        require_non_empty("email_body", &args.email_body)?;
        Ok(json!({ "status": "sent", "username": args.username }))
    }
}
