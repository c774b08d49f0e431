//! 控制面服务入口
//!
//! 加载配置、初始化日志、装配控制面并预置静态目标，然后等待退出信号。
//! 对外接口（发现上报、规则/凭据管理）由进程内其他组件通过
//! [`ControlPlane`] 直接调用。

use anyhow::Result;
use tokio::signal;
use tracing::{info, warn};

use flightwatch_control::ControlPlane;
use flightwatch_shared::config::AppConfig;
use flightwatch_shared::crypto::CredentialEncryptor;
use flightwatch_shared::observability;
use flightwatch_shared::target::Target;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load("flightwatch-control").unwrap_or_else(|e| {
        eprintln!("配置加载失败，使用默认配置: {e}");
        AppConfig::default()
    });

    observability::init(&config.observability)?;

    info!(
        environment = %config.environment,
        "flightwatch-control 启动中"
    );

    let encryptor = match &config.encryption.key_hex {
        Some(hex) => CredentialEncryptor::from_hex(hex)?,
        None => {
            if config.is_production() {
                anyhow::bail!("生产环境必须配置凭据加密密钥 (encryption.key_hex)");
            }
            warn!("未配置加密密钥，凭据将以明文存储（仅限开发环境）");
            CredentialEncryptor::passthrough()
        }
    };

    let plane = ControlPlane::new(encryptor);

    // 预置配置中声明的静态目标
    for static_target in &config.discovery.static_targets {
        let mut target = Target::new(&static_target.jvm_id, &static_target.connect_url);
        if let Some(alias) = &static_target.alias {
            target = target.with_alias(alias);
        }
        plane.targets.observe(target);
    }
    info!(targets = plane.targets.len(), "静态目标已登记");

    info!("控制面就绪，等待退出信号");
    signal::ctrl_c().await?;
    info!("收到退出信号，控制面关闭");

    Ok(())
}
