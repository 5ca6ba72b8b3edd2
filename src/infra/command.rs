//! 命令执行器
//!
//! 提供统一的命令执行接口，支持：
//! - 通过 stdin 传入数据（构建上下文 tar）
//! - 实时日志流式输出并汇总为完整文本
//! - stdout/stderr 分离

use std::process::{ExitStatus, Output, Stdio};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// 命令执行器
pub struct CommandRunner;

/// 命令执行错误
#[derive(Debug)]
pub enum CommandError {
    /// 命令启动失败
    SpawnFailed(std::io::Error),
    /// 等待命令完成失败
    WaitFailed(std::io::Error),
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandError::SpawnFailed(e) => write!(f, "Failed to spawn command: {}", e),
            CommandError::WaitFailed(e) => write!(f, "Failed to wait for command: {}", e),
        }
    }
}

impl std::error::Error for CommandError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CommandError::SpawnFailed(e) | CommandError::WaitFailed(e) => Some(e),
        }
    }
}

/// 流式执行结果
pub struct StreamedOutput {
    /// 退出状态
    pub status: ExitStatus,
    /// 按到达顺序拼接的 stdout/stderr 全文
    pub output: String,
}

impl CommandRunner {
    /// 执行简单命令（无流式输出）
    pub async fn run_simple(program: &str, args: &[&str]) -> Result<Output, CommandError> {
        Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(CommandError::SpawnFailed)
    }

    /// 执行命令并流式输出日志
    ///
    /// 每一行输出到达时立即写入 tracing，同时累积到返回的文本中；
    /// 失败的命令同样返回已收到的全部输出，调用方可以据此展示部分进度
    ///
    /// # Arguments
    /// * `program` - 要执行的程序
    /// * `args` - 命令行参数
    /// * `stdin` - 写入子进程 stdin 的数据（写完即关闭）
    pub async fn run_with_streaming(
        program: &str,
        args: &[&str],
        stdin: Option<Vec<u8>>,
    ) -> Result<StreamedOutput, CommandError> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(CommandError::SpawnFailed)?;

        // 单独的任务写 stdin，避免与输出管道互相阻塞
        let stdin_task = match (child.stdin.take(), stdin) {
            (Some(mut pipe), Some(data)) => Some(tokio::spawn(async move {
                let result = pipe.write_all(&data).await;
                drop(pipe);
                result
            })),
            _ => None,
        };

        let (tx, mut rx) = mpsc::unbounded_channel();
        let stdout_task = spawn_line_reader(child.stdout.take(), "stdout", tx.clone());
        let stderr_task = spawn_line_reader(child.stderr.take(), "stderr", tx);

        let mut output = String::new();
        while let Some((stream, line)) = rx.recv().await {
            info!(program = %program, stream = stream, "{}", line);
            output.push_str(&line);
            output.push('\n');
        }

        let _ = tokio::join!(stdout_task, stderr_task);
        let status = child.wait().await.map_err(CommandError::WaitFailed)?;

        if let Some(task) = stdin_task {
            // 进程提前退出会导致 broken pipe，真正的原因已在输出里
            match task.await {
                Ok(Err(e)) => warn!(program = %program, error = %e, "Failed to write stdin"),
                Err(e) => warn!(program = %program, error = %e, "Stdin writer task panicked"),
                Ok(Ok(())) => {}
            }
        }

        Ok(StreamedOutput { status, output })
    }
}

/// 逐行读取输出并发送到通道
fn spawn_line_reader<R>(
    reader: Option<R>,
    stream: &'static str,
    tx: mpsc::UnboundedSender<(&'static str, String)>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        if let Some(reader) = reader {
            let mut lines = BufReader::new(reader).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if tx.send((stream, line)).is_err() {
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_simple_success() {
        let output = CommandRunner::run_simple("echo", &["hello"]).await.unwrap();
        assert!(output.status.success());
        assert!(String::from_utf8_lossy(&output.stdout).contains("hello"));
    }

    #[tokio::test]
    async fn test_run_simple_not_found() {
        let result = CommandRunner::run_simple("nonexistent_command_12345", &[]).await;
        assert!(matches!(result, Err(CommandError::SpawnFailed(_))));
    }

    #[tokio::test]
    async fn test_streaming_collects_stdin_echo() {
        let result = CommandRunner::run_with_streaming(
            "sh",
            &["-c", "cat; echo done >&2"],
            Some(b"line one\nline two\n".to_vec()),
        )
        .await
        .unwrap();

        assert!(result.status.success());
        assert!(result.output.contains("line one\n"));
        assert!(result.output.contains("line two\n"));
        assert!(result.output.contains("done\n"));
    }

    #[tokio::test]
    async fn test_streaming_keeps_output_on_failure() {
        let result = CommandRunner::run_with_streaming(
            "sh",
            &["-c", "echo step 1; echo broken >&2; exit 3"],
            None,
        )
        .await
        .unwrap();

        assert_eq!(result.status.code(), Some(3));
        assert!(result.output.contains("step 1"));
        assert!(result.output.contains("broken"));
    }
}
