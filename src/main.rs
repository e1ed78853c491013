//! Carousel - 品牌轮播图生成向导
//!
//! 入口：初始化日志、创建编排运行时，从 stdin 逐行读取命令并打印会话状态。

use std::path::PathBuf;

use anyhow::Context;
use carousel::cli::{export_images, parse_line, render, CliAction, HELP};
use carousel::core::{create_studio, Command};
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    carousel::observability::init();

    // 可选：第一个参数为额外的配置文件
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let (cmd_tx, snapshot_rx, mut notice_rx) =
        create_studio(config_path).await.context("Failed to create studio")?;

    // 每条命令完成后打印结果与最新快照
    let printer_rx = snapshot_rx.clone();
    let printer = tokio::spawn(async move {
        while let Ok(notice) = notice_rx.recv().await {
            match notice.result {
                Ok(msg) => println!("[{}] {}", notice.command, msg),
                Err(e) => println!("[{}] error: {}", notice.command, e),
            }
            print!("{}", render(&printer_rx.borrow()));
        }
    });

    println!("{}", HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        match parse_line(&line) {
            Ok(None) => {}
            Ok(Some(CliAction::Studio(Command::Quit))) => break,
            Ok(Some(CliAction::Studio(cmd))) => {
                if cmd_tx.send(cmd).is_err() {
                    break;
                }
            }
            Ok(Some(CliAction::Show)) => print!("{}", render(&snapshot_rx.borrow())),
            Ok(Some(CliAction::Export { dir, slide })) => {
                let snapshot = snapshot_rx.borrow().clone();
                match export_images(&snapshot, &dir, slide).await {
                    Ok(paths) => {
                        for p in paths {
                            println!("wrote {}", p.display());
                        }
                    }
                    Err(e) => println!("export failed: {:#}", e),
                }
            }
            Ok(Some(CliAction::Help)) => println!("{}", HELP),
            Err(msg) => println!("{}", msg),
        }
    }

    let _ = cmd_tx.send(Command::Quit);
    drop(cmd_tx);
    printer.abort();
    Ok(())
}
