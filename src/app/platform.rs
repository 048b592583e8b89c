//! 平台信息：操作系统类型与权限检测。
//!
//! 修改系统 hosts 文件通常需要管理员/root 权限，启动时检测一次并给出提示。

use tracing::{debug, warn};

// ═══════════════════════════════════════════════════════════════════════════
// 数据类型
// ═══════════════════════════════════════════════════════════════════════════

/// 运行平台
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsKind {
    Windows,
    MacOs,
    Linux,
    /// 其他类 Unix 系统
    Other,
}

impl OsKind {
    pub fn current() -> Self {
        Self::from_name(std::env::consts::OS)
    }

    pub fn from_name(name: &str) -> Self {
        match name {
            "windows" => Self::Windows,
            "macos" => Self::MacOs,
            "linux" | "android" => Self::Linux,
            _ => Self::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Windows => "windows",
            Self::MacOs => "macos",
            Self::Linux => "linux",
            Self::Other => "other",
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// 权限
// ═══════════════════════════════════════════════════════════════════════════

/// 当前进程是否具备改写系统 hosts 的权限
#[cfg(unix)]
pub fn is_elevated() -> bool {
    // SAFETY: geteuid 无副作用且总是成功
    unsafe { libc::geteuid() == 0 }
}

/// Windows 下无法廉价判断，交给写入阶段报错
#[cfg(not(unix))]
pub fn is_elevated() -> bool {
    true
}

/// 权限不足时仅提示，不中止：hosts 路径可能被覆盖为用户可写文件
pub fn warn_if_unprivileged() -> bool {
    let elevated = is_elevated();
    if elevated {
        debug!(os = OsKind::current().as_str(), "running with elevated privileges");
    } else {
        let hint = match OsKind::current() {
            OsKind::Windows => "run from an administrator prompt",
            _ => "re-run with sudo",
        };
        warn!(
            os = OsKind::current().as_str(),
            "not running with elevated privileges; writing the hosts file may fail ({})",
            hint
        );
    }
    elevated
}

// ═══════════════════════════════════════════════════════════════════════════
// 测试
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn os_kind_from_name() {
        assert_eq!(OsKind::from_name("windows"), OsKind::Windows);
        assert_eq!(OsKind::from_name("macos"), OsKind::MacOs);
        assert_eq!(OsKind::from_name("linux"), OsKind::Linux);
        assert_eq!(OsKind::from_name("freebsd"), OsKind::Other);
    }

    #[test]
    fn current_matches_cfg() {
        let os = OsKind::current();
        if cfg!(windows) {
            assert_eq!(os, OsKind::Windows);
        } else if cfg!(target_os = "linux") {
            assert_eq!(os, OsKind::Linux);
        }
        assert!(!os.as_str().is_empty());
    }

    #[test]
    fn warning_reports_elevation() {
        assert_eq!(warn_if_unprivileged(), is_elevated());
    }
}
