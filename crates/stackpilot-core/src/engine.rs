//! 照合エンジン
//!
//! Instance → Environment → Stack の三段ループで各インスタンスを巡回し、
//! イメージが古くなった stack を再デプロイする。設計上の不変条件は
//! 「どの階層で失敗しても、その兄弟の処理は必ず続行される」こと。
//! 失敗は最も内側のスコープで捕捉してシンクへ流し、run() は呼び出し元へ
//! エラーを返さない。並行化はしない。すべてのリモート呼び出しは逐次実行。

use crate::model::{Environment, GitRedeployRequest, Image, Stack, StackUpdateRequest};
use crate::notify::Notify;
use crate::portainer::{Portainer, PortainerApi};
use stackpilot_config::InstanceConfig;
use std::time::Duration;

/// self-update 後、Portainer が再起動して API が安定するまで待つ時間
const SELF_UPDATE_SETTLE: Duration = Duration::from_secs(10);

/// 1回の実行の集計。CLI がこれを表示と exit code に変換する
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub instances_processed: usize,
    pub instances_failed: usize,
    pub stacks_updated: usize,
    pub stacks_skipped: usize,
    pub images_deleted: usize,
    pub errors: usize,
}

/// 照合エンジン本体。シンクを1つ抱え、設定されたインスタンスを巡回する
pub struct Reconciler<N> {
    sink: N,
}

impl<N: Notify> Reconciler<N> {
    pub fn new(sink: N) -> Self {
        Self { sink }
    }

    /// 全インスタンスを巡回する。内部で何件失敗しても必ず完走し、
    /// 最後に完了通知を出してから集計を返す
    pub async fn run(&self, instances: &[InstanceConfig]) -> RunReport {
        let mut report = RunReport::default();

        self.sink
            .info(&format!(
                "Starting stack maintenance for {} instance(s)",
                instances.len()
            ))
            .await;

        for (index, instance) in instances.iter().enumerate() {
            let label = instance.display_name(index);

            // 必須項目が欠けたインスタンスはクライアントを作らずに飛ばす
            let Some((host, token)) = instance.connection() else {
                self.sink
                    .error(&format!(
                        "Instance {label} is missing one of name/host/accessToken, skipping"
                    ))
                    .await;
                report.instances_failed += 1;
                report.errors += 1;
                continue;
            };

            let client = match Portainer::new(host, token, instance.verify_ssl) {
                Ok(client) => client,
                Err(e) => {
                    self.sink
                        .error(&format!("Could not build a client for {label}: {e}"))
                        .await;
                    report.instances_failed += 1;
                    report.errors += 1;
                    continue;
                }
            };

            self.process_instance(&client, instance, &label, &mut report)
                .await;
        }

        self.sink.info("Stack maintenance run completed").await;
        report
    }

    /// 構築済みクライアントで1インスタンスを処理する。
    /// ping と environment 一覧の失敗はこのインスタンスだけを打ち切る
    async fn process_instance<C: PortainerApi>(
        &self,
        client: &C,
        instance: &InstanceConfig,
        label: &str,
        report: &mut RunReport,
    ) {
        tracing::debug!(instance = label, "processing instance");

        if let Err(e) = client.ping().await {
            self.sink
                .error(&format!("Instance {label} is unreachable: {e}"))
                .await;
            report.instances_failed += 1;
            report.errors += 1;
            return;
        }

        if instance.update_portainer_version {
            self.self_update(client, label, report).await;
        }

        let environments = match client.environments().await {
            Ok(environments) => environments,
            Err(e) => {
                self.sink
                    .error(&format!("Failed to list environments on {label}: {e}"))
                    .await;
                report.instances_failed += 1;
                report.errors += 1;
                return;
            }
        };

        for environment in &environments {
            self.process_environment(client, instance, environment, report)
                .await;
        }

        report.instances_processed += 1;
    }

    /// Portainer 本体の self-update。更新を当てた後は再起動が落ち着くまで
    /// 待ってから次の API 呼び出しへ進む
    async fn self_update<C: PortainerApi>(&self, client: &C, label: &str, report: &mut RunReport) {
        match client.update_available().await {
            Ok(false) => {
                self.sink
                    .info(&format!("{label} is already on the latest Portainer version"))
                    .await;
            }
            Ok(true) => {
                self.sink
                    .info(&format!("{label} needs an update, applying it now"))
                    .await;
                match client.apply_update().await {
                    Ok(true) => {
                        self.sink
                            .info(&format!("{label} updated successfully"))
                            .await;
                    }
                    Ok(false) => {
                        self.sink
                            .warn(&format!("{label} still reports an update as available"))
                            .await;
                    }
                    Err(e) => {
                        self.sink
                            .error(&format!("Failed to update {label}: {e}"))
                            .await;
                        report.errors += 1;
                    }
                }
                tokio::time::sleep(SELF_UPDATE_SETTLE).await;
            }
            Err(e) => {
                self.sink
                    .error(&format!(
                        "Failed to check for Portainer updates on {label}: {e}"
                    ))
                    .await;
                report.errors += 1;
            }
        }
    }

    /// 1つの environment を処理する。image status のクリアと stack 一覧の
    /// 失敗はこの environment だけを打ち切る
    async fn process_environment<C: PortainerApi>(
        &self,
        client: &C,
        instance: &InstanceConfig,
        environment: &Environment,
        report: &mut RunReport,
    ) {
        let context = format!("environment '{}'", environment.name);

        // この environment で1つでも更新したか。クリーンアップの実行条件
        let mut any_stack_updated = false;

        if let Err(e) = client.clear_image_status(environment.id).await {
            self.sink
                .error(&format!("Failed to clear image status for {context}: {e}"))
                .await;
            report.errors += 1;
            return;
        }

        let stacks = match client.stacks(environment.id).await {
            Ok(stacks) => stacks,
            Err(e) => {
                self.sink
                    .error(&format!("Failed to list stacks for {context}: {e}"))
                    .await;
                report.errors += 1;
                return;
            }
        };

        for stack in &stacks {
            match self
                .process_stack(client, instance, environment.id, stack, report)
                .await
            {
                Ok(true) => {
                    any_stack_updated = true;
                    report.stacks_updated += 1;
                }
                Ok(false) => {
                    report.stacks_skipped += 1;
                }
                Err(e) => {
                    self.sink
                        .error(&format!("Failed to process stack '{}': {e}", stack.name))
                        .await;
                    report.errors += 1;
                }
            }
        }

        // 何も更新していない回に削除パスを走らせても意味がない
        if instance.delete_unused_images && any_stack_updated {
            self.cleanup_unused_images(client, environment.id, &context, report)
                .await;
        }
    }

    /// 1つの stack を処理する。true = 更新を実行した。
    /// クライアント層の失敗は Err で返し、呼び出し側が捕捉してループを続ける
    async fn process_stack<C: PortainerApi>(
        &self,
        client: &C,
        instance: &InstanceConfig,
        environment_id: i64,
        stack: &Stack,
        report: &mut RunReport,
    ) -> crate::error::Result<bool> {
        if instance.ignore_stacks.contains(&stack.name) {
            self.sink
                .info(&format!("Skipping ignored stack '{}'", stack.name))
                .await;
            return Ok(false);
        }

        // git 連携 stack は明示的に opt-in しない限り触らない
        if stack.git_config.is_some() && !instance.update_stacks_with_git {
            self.sink
                .info(&format!(
                    "Skipping git-managed stack '{}' (git integration is disabled for this instance)",
                    stack.name
                ))
                .await;
            return Ok(false);
        }

        let outcome = client.refresh_stack_images(stack.id).await?;
        if outcome.is_current() {
            self.sink
                .info(&format!("Stack '{}' is already up to date", stack.name))
                .await;
            return Ok(false);
        }

        match &stack.git_config {
            Some(git) => {
                let auth = git.authentication.clone().unwrap_or_default();
                let request = GitRedeployRequest {
                    pull_image: true,
                    repository_authentication: auth.requires_authentication(),
                    repository_git_credential_id: auth.credential_id,
                    repository_password: auth.password,
                    repository_reference_name: git.reference_name.clone(),
                    repository_username: auth.username,
                    env: stack.env.clone(),
                    prune: instance.prune_services,
                };
                client
                    .redeploy_stack_git(stack.id, environment_id, request)
                    .await?;
            }
            None => {
                let content = client.stack_file_content(stack.id).await?;
                if content.is_empty() {
                    // 空の内容で PUT すると stack が壊れるので更新しない
                    self.sink
                        .error(&format!(
                            "Stack '{}' has no file content, skipping update",
                            stack.name
                        ))
                        .await;
                    report.errors += 1;
                    return Ok(false);
                }
                let request = StackUpdateRequest {
                    stack_file_content: content,
                    env: stack.env.clone(),
                    id: environment_id,
                    pull_image: true,
                    prune: instance.prune_services,
                    webhook: stack.webhook.clone(),
                };
                client.update_stack(stack.id, environment_id, request).await?;
            }
        }

        self.sink
            .info(&format!("Stack {} updated successfully", stack_link(instance, stack)))
            .await;
        Ok(true)
    }

    /// どの stack からも参照されていないイメージを削除する。
    /// 1枚の削除失敗で残りの削除を止めない
    async fn cleanup_unused_images<C: PortainerApi>(
        &self,
        client: &C,
        environment_id: i64,
        context: &str,
        report: &mut RunReport,
    ) {
        let images = match client.images_with_usage(environment_id).await {
            Ok(images) => images,
            Err(e) => {
                self.sink
                    .error(&format!("Failed to list images for {context}: {e}"))
                    .await;
                report.errors += 1;
                return;
            }
        };

        let unused: Vec<&Image> = images.iter().filter(|image| !image.used).collect();
        if unused.is_empty() {
            return;
        }

        // イメージ削除の URL には環境の Docker API バージョンが要る
        let api_version = match client.docker_api_version(environment_id).await {
            Ok(version) => version,
            Err(e) => {
                self.sink
                    .error(&format!(
                        "Failed to get the Docker API version for {context}: {e}"
                    ))
                    .await;
                report.errors += 1;
                return;
            }
        };

        for image in unused {
            if image.id.is_empty() {
                self.sink
                    .warn(&format!("Skipping an unused image without an id in {context}"))
                    .await;
                continue;
            }
            match client
                .delete_image(environment_id, &api_version, &image.id)
                .await
            {
                Ok(()) => {
                    self.sink
                        .info(&format!(
                            "Deleted unused image {} from {context}",
                            image.display_name()
                        ))
                        .await;
                    report.images_deleted += 1;
                }
                Err(e) => {
                    self.sink
                        .error(&format!(
                            "Failed to delete image {}: {e}",
                            image.display_name()
                        ))
                        .await;
                    report.errors += 1;
                }
            }
        }
    }
}

/// 通知用の stack 表記。host が分かっていれば `[name](url)` のリンク記法
fn stack_link(instance: &InstanceConfig, stack: &Stack) -> String {
    match instance.host.as_deref() {
        Some(host) if !host.is_empty() => format!(
            "[{}]({}/#!/stacks/{})",
            stack.name,
            host.trim_end_matches('/'),
            stack.id
        ),
        _ => format!("'{}'", stack.name),
    }
}
