//! 镜像文件查看
//!
//! 用镜像起一个一次性容器执行 `ls -lah`，读取输出后删除容器，再把输出解析成带类型图标的列表

use tracing::{info, warn};

use crate::infra::{ContainerEngine, ContainerSpec, EngineResult};

use super::janitor::with_transient_container;

/// 依次尝试的内容目录
pub const LISTING_PATHS: [&str; 2] = ["/usr/share/nginx/html/", "/app/"];

/// 两个目录都不存在时的输出
pub const NOT_FOUND_SENTINEL: &str = "Directory not found";

/// `ls -l` 一行至少要有的字段数
const MIN_LISTING_FIELDS: usize = 9;

/// 文件列表及原始输出
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFileListing {
    pub files: Vec<String>,
    pub raw: String,
}

/// 条目类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Folder,
    Html,
    Css,
    Js,
    File,
}

impl EntryKind {
    /// 根据权限串和文件名分类
    pub fn classify(permissions: &str, name: &str) -> Self {
        if permissions.starts_with('d') {
            EntryKind::Folder
        } else if name.ends_with(".html") {
            EntryKind::Html
        } else if name.ends_with(".css") {
            EntryKind::Css
        } else if name.ends_with(".js") {
            EntryKind::Js
        } else {
            EntryKind::File
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            EntryKind::Folder => "📁",
            EntryKind::Html => "📄",
            EntryKind::Css => "🎨",
            EntryKind::Js => "⚡",
            EntryKind::File => "📄",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EntryKind::Folder => "Folder",
            EntryKind::Html => "HTML",
            EntryKind::Css => "CSS",
            EntryKind::Js => "JS",
            EntryKind::File => "File",
        }
    }
}

/// 容器内执行的 shell 命令
pub fn listing_command() -> String {
    let attempts: Vec<String> = LISTING_PATHS
        .iter()
        .map(|path| format!("ls -lah {} 2>/dev/null", path))
        .collect();
    format!("{} || echo \"{}\"", attempts.join(" || "), NOT_FOUND_SENTINEL)
}

/// 解析 `ls -lah` 输出
///
/// 第一行是 `total` 汇总，丢弃；字段不足的行原样保留，`.` 和 `..` 跳过
pub fn parse_listing(raw: &str) -> Vec<String> {
    raw.lines()
        .filter(|line| !line.trim().is_empty())
        .skip(1)
        .filter_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < MIN_LISTING_FIELDS {
                return Some(line.to_string());
            }

            let permissions = parts[0];
            let size = parts[4];
            let name = parts[8..].join(" ");
            if name == "." || name == ".." {
                return None;
            }

            let kind = EntryKind::classify(permissions, &name);
            Some(format!("{} {}: {} ({})", kind.icon(), kind.label(), name, size))
        })
        .collect()
}

/// 列出镜像中内容目录的文件
///
/// 顺序固定为 create → start → wait → logs → remove，remove 在任何失败后都会执行
pub async fn inspect(engine: &dyn ContainerEngine, image: &str) -> EngineResult<ImageFileListing> {
    let name = format!("inspect-{}", uuid::Uuid::new_v4().simple());
    let spec = ContainerSpec::new(image)
        .name(name)
        .command(["sh".to_string(), "-c".to_string(), listing_command()]);

    let raw = with_transient_container(engine, &spec, move |id| async move {
        engine.start_container(&id).await?;
        let exit_code = engine.wait_container(&id).await?;
        if exit_code != 0 {
            warn!(container_id = %id, exit_code = exit_code, "Listing command exited with non-zero status");
        }
        engine.container_logs(&id).await
    })
    .await?;

    let files = parse_listing(&raw);
    info!(image = %image, entries = files.len(), "Inspected image files");

    Ok(ImageFileListing { files, raw })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::fake::FakeEngine;

    const NGINX_LISTING: &str = "total 16K
drwxr-xr-x 1 root root 4.0K May  1 10:00 .
drwxr-xr-x 1 root root 4.0K May  1 10:00 ..
-rw-r--r-- 1 root root  497 Apr 16 14:00 50x.html
drwxr-xr-x 2 root root 4.0K May  1 10:00 assets
-rw-r--r-- 1 root root 1.2K May  1 10:00 style.css
-rw-r--r-- 1 root root  88K May  1 10:00 app.js
-rw-r--r-- 1 root root   12 May  1 10:00 my notes.txt
";

    #[test]
    fn test_parse_listing() {
        let files = parse_listing(NGINX_LISTING);
        assert_eq!(
            files,
            vec![
                "📄 HTML: 50x.html (497)",
                "📁 Folder: assets (4.0K)",
                "🎨 CSS: style.css (1.2K)",
                "⚡ JS: app.js (88K)",
                "📄 File: my notes.txt (12)",
            ]
        );
    }

    #[test]
    fn test_parse_is_idempotent() {
        assert_eq!(parse_listing(NGINX_LISTING), parse_listing(NGINX_LISTING));
    }

    #[test]
    fn test_short_lines_are_kept_verbatim() {
        let raw = "total 4K\nls: cannot access something\n-rw-r--r-- 1 root root 5 May 1 10:00 a.txt\n";
        let files = parse_listing(raw);
        assert_eq!(files[0], "ls: cannot access something");
        assert_eq!(files[1], "📄 File: a.txt (5)");
    }

    #[test]
    fn test_sentinel_yields_empty_listing() {
        let raw = format!("{}\n", NOT_FOUND_SENTINEL);
        assert!(parse_listing(&raw).is_empty());
    }

    #[test]
    fn test_dot_entries_never_appear() {
        let files = parse_listing(NGINX_LISTING);
        assert!(files.iter().all(|f| !f.ends_with(": . (4.0K)") && !f.ends_with(": .. (4.0K)")));
    }

    #[test]
    fn test_listing_command() {
        assert_eq!(
            listing_command(),
            "ls -lah /usr/share/nginx/html/ 2>/dev/null || ls -lah /app/ 2>/dev/null || echo \"Directory not found\""
        );
    }

    #[tokio::test]
    async fn test_inspect_sequence_and_cleanup() {
        let engine = FakeEngine::new();
        *engine.logs_output.lock().unwrap() = NGINX_LISTING.to_string();

        let listing = inspect(&engine, "nginx:latest").await.unwrap();
        assert_eq!(listing.files.len(), 5);
        assert_eq!(listing.raw, NGINX_LISTING);
        assert_eq!(
            engine.operations(),
            vec!["create", "start", "wait", "logs", "rm"]
        );

        let created = engine.created.lock().unwrap();
        assert_eq!(created[0].image, "nginx:latest");
        assert_eq!(created[0].command[0], "sh");
        assert!(created[0].name.as_deref().unwrap().starts_with("inspect-"));
    }

    #[tokio::test]
    async fn test_inspect_removes_container_when_wait_fails() {
        let engine = FakeEngine::new();
        engine.fail_on("wait");

        let result = inspect(&engine, "nginx:latest").await;
        assert!(result.is_err());
        assert_eq!(engine.operations(), vec!["create", "start", "wait", "rm"]);
    }

    #[tokio::test]
    async fn test_inspect_sentinel_is_success() {
        let engine = FakeEngine::new();
        *engine.logs_output.lock().unwrap() = "Directory not found\n".to_string();

        let listing = inspect(&engine, "busybox").await.unwrap();
        assert!(listing.files.is_empty());
        assert_eq!(listing.raw, "Directory not found\n");
    }
}
