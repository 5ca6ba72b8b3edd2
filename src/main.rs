//! Docker Builder Agent
//!
//! Usage:
//! - Normal mode: `docker-builder-agent`
//! - With custom port: `docker-builder-agent --port 4000`

use docker_builder_agent::RuntimeConfig;

/// 解析命令行参数
fn parse_args() -> RuntimeConfig {
    let args: Vec<String> = std::env::args().collect();
    let mut config = RuntimeConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--port" if i + 1 < args.len() => {
                config.port_override = args[i + 1].parse().ok();
                i += 2;
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            _ => {
                i += 1;
            }
        }
    }

    config
}

fn print_help() {
    println!("Docker Builder Agent - 镜像构建与容器管理服务");
    println!();
    println!("USAGE:");
    println!("    docker-builder-agent [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    --port <PORT>    Override the listening port");
    println!("    -h, --help       Print help information");
    println!();
    println!("ENVIRONMENT:");
    println!("    PORT, HOST, DOCKER_BIN, UPLOAD_DIR, EXPORT_DIR,");
    println!("    CONTAINER_START_PORT, CONTAINER_PORT, MAX_UPLOAD_MB, RUST_LOG");
}

fn main() {
    let config = parse_args();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = rt.block_on(docker_builder_agent::init_and_run_agent_with_config(config)) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
