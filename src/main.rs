use std::process::{self, ExitCode};

use anyhow::Context;
use clap::Parser;

use orin_share::cli::{self, Args, Mode, SetupArgs};
use orin_share::credentials::Credentials;
use orin_share::host::{Host, SystemHost};
use orin_share::remote::SshSession;
use orin_share::{logging, preflight, share, ShareError};

fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = logging::init_logger(args.log_file.as_deref()) {
        eprintln!("[!] Cannot open log file: {}", e);
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("[!] {:#}", e);
            if let Some(ShareError::InterfaceNotFound { available }) = e.downcast_ref::<ShareError>() {
                eprintln!("[*] Available interfaces:");
                for name in available {
                    eprintln!("    |- {}", name);
                }
                eprintln!("[*] Pass one explicitly as the HOST_INTERFACE argument.");
            }
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> anyhow::Result<()> {
    let host = SystemHost::new();

    match args.mode()? {
        Mode::Stop => {
            share::stop(&host).context("stopping internet sharing")?;
        }
        Mode::Setup(setup) => run_setup(&host, setup)?,
    }
    Ok(())
}

fn run_setup(host: &dyn Host, setup: SetupArgs) -> anyhow::Result<()> {
    preflight::check_tools(host, setup.identity.is_none())?;

    let credentials = Credentials::resolve(
        setup.user,
        setup.password,
        setup.identity,
        cli::prompt_password,
    )?;

    ctrlc::set_handler(|| {
        eprintln!("\n[!] Interrupted. Host forwarding and NAT may be partially applied.");
        eprintln!("[*] Run `orin-share STOP` to revert the host side.");
        process::exit(130);
    })
    .context("installing Ctrl-C handler")?;

    let session = SshSession::new(setup.device, setup.port, &credentials);
    let report = share::setup(
        host,
        &session,
        &credentials,
        setup.device,
        setup.interface.as_deref(),
    )?;

    if report.diagnostics.all_passed() {
        println!("[+] {} is online through {}", setup.device, report.uplink.name);
    } else {
        println!("[!] Setup done, but some connectivity checks failed on {}", setup.device);
    }
    Ok(())
}
