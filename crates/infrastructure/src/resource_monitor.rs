//! 进程资源读取
//!
//! 任务执行跟踪器用它计算执行前后的常驻内存差值。

use tracing::trace;

/// 当前进程的常驻内存（字节），无法读取时返回 0
pub fn memory_usage() -> u64 {
    match read_rss() {
        Ok(bytes) => bytes,
        Err(e) => {
            trace!("无法读取进程内存: {e}");
            0
        }
    }
}

#[cfg(target_os = "linux")]
fn read_rss() -> Result<u64, Box<dyn std::error::Error + Send + Sync>> {
    let status = std::fs::read_to_string("/proc/self/status")?;
    for line in status.lines() {
        if let Some(rest) = line.strip_prefix("VmRSS:") {
            let kb: u64 = rest
                .split_whitespace()
                .next()
                .ok_or("VmRSS 行格式无效")?
                .parse()?;
            return Ok(kb * 1024);
        }
    }
    Ok(0)
}

#[cfg(not(target_os = "linux"))]
fn read_rss() -> Result<u64, Box<dyn std::error::Error + Send + Sync>> {
    Ok(0)
}
