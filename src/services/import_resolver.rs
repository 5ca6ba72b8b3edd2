//! 导入镜像识别
//!
//! `docker load` 之后要给新镜像打标签，但输出格式并不固定。按顺序尝试：
//! 1. 输出最后一个非空行的 `Loaded image: <ref>`
//! 2. 输出中第一个 `sha256:<hex>`
//! 3. 镜像列表里最新的一个
//!
//! 第 3 步在并发导入/构建时可能选错镜像，这是已知的限制，通过 `ResolutionMethod::Fallback` 暴露出来

use regex::Regex;
use std::sync::OnceLock;

use crate::domain::{ImageSummary, ResolutionMethod};

/// 识别结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// 镜像引用或 ID
    pub reference: String,
    pub method: ResolutionMethod,
}

/// 基于 load 输出的识别策略
type Strategy = fn(&str) -> Option<String>;

/// 按优先级排列
const OUTPUT_STRATEGIES: &[(ResolutionMethod, Strategy)] = &[
    (ResolutionMethod::Exact, loaded_reference),
    (ResolutionMethod::DigestScan, first_digest),
];

const LOADED_IMAGE_PREFIX: &str = "Loaded image: ";

fn digest_regex() -> &'static Regex {
    static DIGEST: OnceLock<Regex> = OnceLock::new();
    DIGEST.get_or_init(|| Regex::new(r"sha256:[a-f0-9]+").expect("Invalid digest regex"))
}

/// 只看 load 输出的识别
pub fn resolve_from_output(output: &str) -> Option<Resolution> {
    OUTPUT_STRATEGIES.iter().find_map(|(method, strategy)| {
        strategy(output).map(|reference| Resolution {
            reference,
            method: *method,
        })
    })
}

/// 最后的兜底：镜像列表中的第一个（最新创建）
pub fn resolve_from_listing(images: &[ImageSummary]) -> Option<Resolution> {
    images
        .iter()
        .map(|image| image.id.trim())
        .find(|id| !id.is_empty())
        .map(|id| Resolution {
            reference: id.to_string(),
            method: ResolutionMethod::Fallback,
        })
}

/// 最后一个非空行的 `Loaded image: <ref>`
fn loaded_reference(output: &str) -> Option<String> {
    output
        .lines()
        .map(str::trim)
        .rfind(|line| !line.is_empty())?
        .strip_prefix(LOADED_IMAGE_PREFIX)
        .map(str::trim)
        .filter(|reference| !reference.is_empty())
        .map(str::to_string)
}

/// 第一个 `sha256:<hex>`
fn first_digest(output: &str) -> Option<String> {
    digest_regex()
        .find(output)
        .map(|m| m.as_str().to_string())
}
