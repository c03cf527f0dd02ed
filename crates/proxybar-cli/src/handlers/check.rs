//! Installation check.

use anyhow::Result;
use proxybar_core::platform;
use proxybar_core::Supervisor;
use serde_json::json;

/// Print what `start` would run. Returns whether anything was found.
pub fn report(supervisor: &Supervisor, as_json: bool) -> Result<bool> {
    let config = supervisor.config();
    let plan = supervisor.launch_plan().ok();
    let installed = plan.is_some();

    if as_json {
        let value = json!({
            "installed": installed,
            "platform": platform::current_platform(),
            "program": config.program,
            "plan": plan,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(installed);
    }

    match &plan {
        Some(plan) => {
            let via = if plan.via_runner { " (via runner)" } else { "" };
            println!(
                "{}: {} {}{}",
                config.program,
                plan.executable.display(),
                plan.args.join(" "),
                via
            );
            if let Some(found) = supervisor.resolver().locate(&config.program) {
                println!("found via: {:?}", found.source);
            }
            match &plan.runtime {
                Some(runtime) => println!("runtime: {}", runtime.display()),
                None => println!("runtime: not found, PATH left unchanged"),
            }
        }
        None => {
            println!(
                "Could not find {}. Please install it with: npm install -g {}",
                config.program, config.program
            );
        }
    }

    Ok(installed)
}
