//! 构建上下文组装
//!
//! 把上传的 Dockerfile 和附加文件打成一个 tar，`Dockerfile` 永远是第一个条目，
//! 附加文件按上传顺序跟在后面，同名条目后写入者覆盖先写入者

use thiserror::Error;

use crate::config::env::constants::MAX_ADDITIONAL_FILES;

use super::janitor::TransientFile;

/// Dockerfile 在构建上下文中的固定名称
pub const DOCKERFILE_ENTRY: &str = "Dockerfile";

/// 构建上下文错误
#[derive(Debug, Error)]
pub enum BuildContextError {
    #[error("imageName is required")]
    MissingImageName,

    #[error("dockerfile is required")]
    MissingDockerfile,

    #[error("invalid file name: {0:?}")]
    InvalidFileName(String),

    #[error("too many additional files: {count} (max {max})")]
    TooManyFiles { count: usize, max: usize },

    #[error("failed to assemble build context: {0}")]
    Io(#[from] std::io::Error),
}

/// 单个 tar 条目
#[derive(Debug, Clone)]
struct ContextEntry {
    name: String,
    content: Vec<u8>,
}

/// 内存中的构建上下文
#[derive(Debug, Clone)]
pub struct BuildContext {
    entries: Vec<ContextEntry>,
}

impl BuildContext {
    /// 以 Dockerfile 内容开始一个新的上下文
    pub fn new(dockerfile: Vec<u8>) -> Self {
        Self {
            entries: vec![ContextEntry {
                name: DOCKERFILE_ENTRY.to_string(),
                content: dockerfile,
            }],
        }
    }

    /// 追加文件；与已有条目重名时替换其内容
    pub fn add_file(&mut self, name: &str, content: Vec<u8>) -> Result<(), BuildContextError> {
        let name = entry_name(name)?;

        match self.entries.iter_mut().find(|e| e.name == name) {
            Some(existing) => {
                tracing::debug!(entry = %name, "Duplicate build context entry, keeping the later file");
                existing.content = content;
            }
            None => self.entries.push(ContextEntry { name, content }),
        }
        Ok(())
    }

    /// 条目名称，按写入 tar 的顺序
    pub fn entry_names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 写出并封口 tar 归档
    pub fn into_archive(self) -> Result<Vec<u8>, BuildContextError> {
        let mtime = chrono::Utc::now().timestamp().max(0) as u64;
        let mut builder = tar::Builder::new(Vec::new());

        for entry in &self.entries {
            let mut header = tar::Header::new_gnu();
            header.set_entry_type(tar::EntryType::Regular);
            header.set_size(entry.content.len() as u64);
            header.set_mode(0o644);
            header.set_mtime(mtime);
            builder.append_data(&mut header, &entry.name, entry.content.as_slice())?;
        }

        Ok(builder.into_inner()?)
    }
}

/// 校验请求并把上传文件组装成 tar
pub async fn assemble(
    image_name: &str,
    dockerfile: Option<&TransientFile>,
    additional_files: &[TransientFile],
) -> Result<Vec<u8>, BuildContextError> {
    if image_name.trim().is_empty() {
        return Err(BuildContextError::MissingImageName);
    }
    let dockerfile = dockerfile.ok_or(BuildContextError::MissingDockerfile)?;
    if additional_files.len() > MAX_ADDITIONAL_FILES {
        return Err(BuildContextError::TooManyFiles {
            count: additional_files.len(),
            max: MAX_ADDITIONAL_FILES,
        });
    }

    let mut context = BuildContext::new(dockerfile.read().await?);
    for file in additional_files {
        let content = file.read().await?;
        context.add_file(file.original_name(), content)?;
    }

    tracing::debug!(entries = ?context.entry_names(), "Assembled build context");
    context.into_archive()
}

/// 取原始文件名的最后一段作为条目名
fn entry_name(name: &str) -> Result<String, BuildContextError> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    if base.is_empty() || base == "." || base == ".." {
        return Err(BuildContextError::InvalidFileName(name.to_string()));
    }
    Ok(base.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn read_entries(archive: &[u8]) -> Vec<(String, Vec<u8>)> {
        let mut archive = tar::Archive::new(archive);
        archive
            .entries()
            .unwrap()
            .map(|entry| {
                let mut entry = entry.unwrap();
                let name = entry.path().unwrap().to_string_lossy().into_owned();
                let mut content = Vec::new();
                entry.read_to_end(&mut content).unwrap();
                (name, content)
            })
            .collect()
    }

    fn upload(dir: &std::path::Path, stored: &str, original: &str, content: &[u8]) -> TransientFile {
        let path = dir.join(stored);
        std::fs::write(&path, content).unwrap();
        TransientFile::new(path, original)
    }

    #[test]
    fn test_dockerfile_only() {
        let archive = BuildContext::new(b"FROM scratch".to_vec())
            .into_archive()
            .unwrap();

        let entries = read_entries(&archive);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, "Dockerfile");
        assert_eq!(entries[0].1, b"FROM scratch");
    }

    #[test]
    fn test_additional_files_keep_order() {
        let mut ctx = BuildContext::new(b"FROM nginx".to_vec());
        ctx.add_file("index.html", b"<h1>hi</h1>".to_vec()).unwrap();
        ctx.add_file("style.css", b"body{}".to_vec()).unwrap();
        ctx.add_file("app.js", b"1".to_vec()).unwrap();

        let entries = read_entries(&ctx.into_archive().unwrap());
        let names: Vec<&str> = entries.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["Dockerfile", "index.html", "style.css", "app.js"]);
    }

    #[test]
    fn test_duplicate_names_last_write_wins() {
        let mut ctx = BuildContext::new(b"FROM nginx".to_vec());
        ctx.add_file("index.html", b"old".to_vec()).unwrap();
        ctx.add_file("app.js", b"js".to_vec()).unwrap();
        ctx.add_file("index.html", b"new".to_vec()).unwrap();

        assert_eq!(ctx.entry_names(), vec!["Dockerfile", "index.html", "app.js"]);
        let entries = read_entries(&ctx.into_archive().unwrap());
        assert_eq!(entries[1].1, b"new");
    }

    #[test]
    fn test_entry_name_strips_directories() {
        assert_eq!(entry_name("site/index.html").unwrap(), "index.html");
        assert_eq!(entry_name("C:\\work\\app.js").unwrap(), "app.js");
        assert!(matches!(
            entry_name(".."),
            Err(BuildContextError::InvalidFileName(_))
        ));
        assert!(entry_name("dir/").is_err());
    }

    #[tokio::test]
    async fn test_assemble_validates_before_reading() {
        let dir = tempfile::tempdir().unwrap();
        let dockerfile = upload(dir.path(), "1-Dockerfile", "Dockerfile", b"FROM scratch");

        let err = assemble("", Some(&dockerfile), &[]).await.unwrap_err();
        assert!(matches!(err, BuildContextError::MissingImageName));

        let err = assemble("myapp", None, &[]).await.unwrap_err();
        assert!(matches!(err, BuildContextError::MissingDockerfile));
    }

    #[tokio::test]
    async fn test_assemble_uses_original_names() {
        let dir = tempfile::tempdir().unwrap();
        let dockerfile = upload(dir.path(), "1-Dockerfile", "Dockerfile", b"FROM nginx");
        let extra = vec![
            upload(dir.path(), "2-index.html", "index.html", b"<html/>"),
            upload(dir.path(), "3-main.js", "main.js", b"run()"),
        ];

        let archive = assemble("myapp", Some(&dockerfile), &extra).await.unwrap();
        let entries = read_entries(&archive);

        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0], ("Dockerfile".to_string(), b"FROM nginx".to_vec()));
        assert_eq!(entries[1].0, "index.html");
        assert_eq!(entries[2], ("main.js".to_string(), b"run()".to_vec()));
    }
}
