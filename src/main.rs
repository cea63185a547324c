use std::process::ExitCode;

use bob_loader::{BobVolumeFile, DenseVolume, LoadError, LoaderConfig};

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let Some(path) = std::env::args().nth(1) else {
        eprintln!("用法: bob-loader <bobNNN.bob 目录>");
        eprintln!("设置 {} 可读取未压缩的 block 文件", bob_loader::NO_GZIP_ENV);
        return ExitCode::FAILURE;
    };

    let config = LoaderConfig::from_env();
    println!("时间步目录: {}", path);
    println!("worker 数: {}", config.worker_count());
    println!("gzip: {}", config.use_gzip);

    let mut volume = DenseVolume::new();
    let report = match BobVolumeFile::new(&path).import_volume(&mut volume, config) {
        Ok(report) => report,
        Err(LoadError::Incomplete(report)) => {
            eprintln!("加载不完整: {}", report);
            print_report(&report);
            return ExitCode::FAILURE;
        }
        Err(e) => {
            eprintln!("加载失败: {}", e);
            return ExitCode::FAILURE;
        }
    };

    print_report(&report);
    ExitCode::SUCCESS
}

fn print_report(report: &bob_loader::LoadReport) {
    match report.to_json() {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("序列化加载报告失败: {}", e),
    }
}
