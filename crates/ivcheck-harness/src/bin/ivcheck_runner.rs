//! Conformance-run driver.
//!
//! Picks a built-in scenario (or loads a JSON script), optionally brackets
//! the run with a server-group launch, drives the execution engine, and
//! prints the report.
//!
//! Usage:
//!   ivcheck-runner [--scenario <name>] [--script <path>]
//!                  [--client-bin <path>] [--client-prefix <cmd...>]
//!                  [--server-cmd <cmd...>] [--ranks <n>]
//!                  [--shared-dir <path>] [--wait-ms <n>]
//!                  [--list] [--json]
//!
//! Exit code 0 when every action passed, 1 on a failed run, 2 on a usage
//! or configuration error.

use std::path::PathBuf;
use std::process::exit;
use std::thread;
use std::time::Duration;

use ivcheck_harness::config::{self, HarnessConfig, WaitPolicy};
use ivcheck_harness::lifecycle::{ProcessGroupLifecycle, ServerLifecycle};
use ivcheck_harness::scenario;
use ivcheck_harness::{ExecutionEngine, ProcessClientInvoker};
use ivcheck_types::Action;

fn usage() -> ! {
    eprintln!(
        "ivcheck-runner — drive a conformance scenario against a live IV cache

options:
  --scenario <name>       built-in scenario (default: one_node_suite)
  --script <path>         JSON action script instead of a built-in
  --client-bin <path>     IV client binary (default: iv_client)
  --client-prefix <cmd>   launcher command prepended to client invocations
  --server-cmd <cmd>      launch this server group around the run
  --ranks <n>             ranks in the group (default: 5)
  --shared-dir <path>     result-exchange directory (default: $IVCHECK_SHARED_DIR, then $HOME)
  --wait-ms <n>           fixed delay after synced mutations (default: none)
  --list                  list built-in scenarios and exit
  --json                  print the full report as JSON"
    );
    exit(2);
}

fn fail(message: &str) -> ! {
    eprintln!("ivcheck-runner: {message}");
    exit(2);
}

struct Cli {
    scenario: String,
    script: Option<PathBuf>,
    config: HarnessConfig,
    server_cmd: Option<Vec<String>>,
    shared_dir: Option<PathBuf>,
    json: bool,
}

fn parse_args() -> Cli {
    let mut cli = Cli {
        scenario: "one_node_suite".to_owned(),
        script: None,
        config: HarnessConfig::default(),
        server_cmd: None,
        shared_dir: None,
        json: false,
    };

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        let mut value = |flag: &str| -> String {
            args.next().unwrap_or_else(|| fail(&format!("{flag} needs a value")))
        };
        match arg.as_str() {
            "--scenario" => cli.scenario = value("--scenario"),
            "--script" => cli.script = Some(PathBuf::from(value("--script"))),
            "--client-bin" => cli.config.client_bin = PathBuf::from(value("--client-bin")),
            "--client-prefix" => {
                cli.config.client_prefix = value("--client-prefix")
                    .split_whitespace()
                    .map(str::to_owned)
                    .collect();
            }
            "--server-cmd" => {
                cli.server_cmd = Some(
                    value("--server-cmd")
                        .split_whitespace()
                        .map(str::to_owned)
                        .collect(),
                );
            }
            "--ranks" => {
                cli.config.rank_count = value("--ranks")
                    .parse()
                    .unwrap_or_else(|_| fail("--ranks needs an unsigned integer"));
            }
            "--shared-dir" => cli.shared_dir = Some(PathBuf::from(value("--shared-dir"))),
            "--wait-ms" => {
                let ms: u64 = value("--wait-ms")
                    .parse()
                    .unwrap_or_else(|_| fail("--wait-ms needs milliseconds"));
                cli.config.wait = WaitPolicy::FixedDelay(Duration::from_millis(ms));
            }
            "--list" => {
                for meta in scenario::scenario_catalog() {
                    println!("{:<28} {}", meta.name, meta.description);
                }
                exit(0);
            }
            "--json" => cli.json = true,
            "-h" | "--help" => usage(),
            other => fail(&format!("unknown argument '{other}'")),
        }
    }
    cli
}

fn load_actions(cli: &Cli) -> Vec<Action> {
    if let Some(path) = &cli.script {
        return scenario::load_script(path)
            .unwrap_or_else(|err| fail(&format!("cannot load script: {err}")));
    }
    scenario::by_name(&cli.scenario)
        .unwrap_or_else(|| fail(&format!("unknown scenario '{}'; try --list", cli.scenario)))
}

fn main() {
    let mut cli = parse_args();
    let actions = load_actions(&cli);

    cli.config.shared_dir = match cli.shared_dir.take() {
        Some(dir) => dir,
        None => config::shared_dir_from_env()
            .unwrap_or_else(|err| fail(&err.to_string())),
    };

    let mut server = cli.server_cmd.clone().map(ProcessGroupLifecycle::new);
    if let Some(server) = server.as_mut() {
        if let Err(err) = server.launch() {
            fail(&format!("server launch failed: {err}"));
        }
        thread::sleep(cli.config.launch_settle);
        if !server.check_running() {
            let code = server.stop().unwrap_or(-1);
            fail(&format!("server group did not stay up (exit {code})"));
        }
    }

    let invoker = ProcessClientInvoker;
    let engine = ExecutionEngine::new(&cli.config, &invoker);
    let report = engine.run(&actions);

    if let Some(server) = server.as_mut() {
        if server.check_running() {
            match server.stop() {
                Ok(code) => eprintln!("server group stopped (exit {code})"),
                Err(err) => eprintln!("server group stop failed: {err}"),
            }
        }
    }

    if cli.json {
        match serde_json::to_string_pretty(&report) {
            Ok(text) => println!("{text}"),
            Err(err) => fail(&format!("cannot serialize report: {err}")),
        }
    } else {
        println!("{}", report.summary());
        for failure in &report.shutdown.failures {
            println!("  shutdown: rank {} — {}", failure.rank, failure.detail);
        }
    }

    exit(i32::from(!report.success));
}
