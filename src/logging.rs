use anyhow::{Context, Result};
use log::debug;

use crate::config::LoggingSettings;

/// 初始化全域 logger。
///
/// 若設定了 log4rs 的 YAML 檔且檔案存在，則以該檔初始化；
/// 否則使用 `env_logger`，`RUST_LOG` 可覆寫 `level`。
/// 重複呼叫時第二次以後的初始化會失敗，因此 `env_logger` 使用 `try_init` 並忽略結果。
pub fn init(settings: &LoggingSettings) -> Result<()> {
    if let Some(path) = settings.config_file.as_ref()
        && path.is_file()
    {
        log4rs::init_file(path, Default::default())
            .with_context(|| format!("載入日誌設定失敗: {}", path.display()))?;
        debug!("Logging configured from {}", path.display());
        return Ok(());
    }

    let env = env_logger::Env::default().default_filter_or(settings.level.as_str());
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .try_init();
    Ok(())
}
