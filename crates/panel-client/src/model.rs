//! DTOs mirroring the remote panel's JSON shapes.
//!
//! The panel wraps every resource in an `{object, attributes}` envelope and
//! every list response in `{object: "list", data: [...], meta: {pagination}}`,
//! so those envelopes are modeled once here and reused by every resource.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ListResponse<T> {
	pub data: Vec<Wrapped<T>>,
	pub meta: ListMeta,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ListMeta {
	pub pagination: Pagination,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct Pagination {
	pub total: u64,
	pub count: u64,
	pub per_page: u64,
	pub current_page: u64,
	pub total_pages: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Wrapped<T> {
	pub attributes: T,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SingleResponse<T> {
	pub attributes: T,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Location {
	pub id: i64,
	pub short: String,
	pub long: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Node {
	pub id: i64,
	pub uuid: Uuid,
	pub name: String,
	pub fqdn: String,
	pub scheme: String,
	pub memory: i64,
	pub disk: i64,
	pub daemon_listen: i32,
	pub daemon_sftp: i32,
	pub maintenance_mode: bool,
	pub location_id: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Allocation {
	pub id: i64,
	pub ip: String,
	pub port: i32,
	pub alias: Option<String>,
	pub notes: Option<String>,
	pub assigned: bool,
	/// Only present when the allocation was fetched via a server's
	/// `?include=allocations` expansion.
	#[serde(default)]
	pub server_id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Nest {
	pub id: i64,
	pub uuid: Uuid,
	pub name: String,
	pub author: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Egg {
	pub id: i64,
	pub uuid: Uuid,
	pub nest: i64,
	pub name: String,
	#[serde(default)]
	pub relationships: Option<EggRelationships>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EggRelationships {
	#[serde(default)]
	pub variables: Option<ListResponse<EggVariable>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EggVariable {
	pub id: i64,
	pub egg_id: i64,
	pub env_variable: String,
	pub default_value: String,
	pub user_viewable: bool,
	pub user_editable: bool,
	pub rules: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct User {
	pub id: i64,
	pub email: String,
	pub first_name: String,
	pub last_name: String,
	pub root_admin: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Server {
	pub id: i64,
	pub uuid: Uuid,
	pub identifier: String,
	pub name: String,
	pub status: Option<String>,
	pub suspended: bool,
	pub user: i64,
	pub node: i64,
	pub egg: i64,
	pub limits: ServerLimits,
	#[serde(default)]
	pub relationships: Option<ServerRelationships>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct ServerLimits {
	pub memory: i64,
	pub disk: i64,
	pub cpu: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerRelationships {
	#[serde(default)]
	pub allocations: Option<ListResponse<Allocation>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerDatabase {
	pub id: i64,
	pub server: i64,
	pub database: String,
	pub username: String,
	#[serde(default)]
	pub host: Option<DatabaseHost>,
	pub max_connections: i32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseHost {
	pub address: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Subuser {
	pub id: i64,
	pub user_id: i64,
	pub email: String,
	pub permissions: Vec<String>,
}
