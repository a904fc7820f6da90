//! stackpilot-core — Portainer インスタンスを巡回して stack を最新に保つ中核
//!
//! - [`engine`]: Instance → Environment → Stack の照合ループ
//! - [`portainer`]: Portainer API クライアントとその contract
//! - [`notify`]: 運用者向け通知シンクのインターフェース
//! - [`model`]: リモートから取得する一時データのモデル

pub mod engine;
pub mod error;
pub mod model;
pub mod notify;
pub mod portainer;

pub use engine::{Reconciler, RunReport};
pub use error::{PortainerError, Result};
pub use model::{
    Environment, GitAuth, GitRedeployRequest, Image, RefreshOutcome, Stack, StackGitConfig,
    StackUpdateRequest,
};
pub use notify::{Level, Notify};
pub use portainer::{Portainer, PortainerApi};
