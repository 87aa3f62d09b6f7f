//! `rcal` - CLI for rcaledger
//!
//! This binary provides the command-line interface for recording RCA remarks
//! against AWBs and reading them back.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use anyhow::{bail, Context};
use clap::Parser;

use rcaledger::cli::{
    Cli, Command, ConfigCommand, ExportCommand, OutputFormat, StatusCommand, SubmitCommand,
    SummaryCommand, TrackCommand, UserCommand,
};
use rcaledger::record::format_timestamp;
use rcaledger::{export, init_logging, BatchSubmission, Config, Ledger, RequestContext};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    // `config validate` checks its own file rather than the one loaded below.
    if let Command::Config(ConfigCommand::Validate { file }) = &cli.command {
        return handle_validate(file.clone().or_else(|| cli.config.clone()));
    }

    let config = Config::load_from(cli.config.clone()).context("failed to load configuration")?;

    match &cli.command {
        Command::Config(config_cmd) => handle_config(&config, config_cmd),
        Command::Status(status_cmd) => handle_status(&config, status_cmd),
        Command::User(UserCommand::Bootstrap {
            email,
            name,
            new_password,
        }) => {
            let ledger = Ledger::open(&config)?;
            let user = ledger.bootstrap_user(email, name, new_password)?;
            println!("Created superadmin {}", user.email);
            Ok(())
        }
        command => {
            let mut ledger = Ledger::open(&config)?;
            let ctx = login(&ledger, &cli)?;
            match command {
                Command::Track(cmd) => handle_track(&ledger, cmd),
                Command::Submit(cmd) => handle_submit(&mut ledger, &ctx, cmd),
                Command::Summary(cmd) => handle_summary(&ledger, &ctx, cmd),
                Command::Export(cmd) => handle_export(&ledger, &ctx, &config, cmd),
                Command::User(cmd) => handle_user(&ledger, &ctx, cmd),
                Command::Prune => {
                    let report = ledger.prune(&ctx)?;
                    println!(
                        "Pruned {} archived remarks and {} login events",
                        report.deleted_remarks, report.login_events
                    );
                    Ok(())
                }
                Command::Config(_) | Command::Status(_) => Ok(()),
            }
        }
    }
}

fn login(ledger: &Ledger, cli: &Cli) -> anyhow::Result<RequestContext> {
    let Some((email, password)) = cli.credentials() else {
        bail!("this command needs --email and --password (or RCALEDGER_EMAIL / RCALEDGER_PASSWORD)");
    };
    Ok(ledger.login(email, password)?)
}

fn handle_track(ledger: &Ledger, cmd: &TrackCommand) -> anyhow::Result<()> {
    let awbs = cmd.input.collect()?;
    if awbs.is_empty() {
        bail!("no AWBs given");
    }
    let tracked = ledger.track(&awbs)?;

    match cmd.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&tracked)?),
        OutputFormat::Table => {
            println!(
                "{:<16} {:<12} {:<10} {:<24} {:<32} REMARK",
                "AWB", "SC", "TYPE", "UPDATED ON", "UPDATED BY"
            );
            for entry in &tracked {
                if entry.remarks.is_empty() {
                    println!("{:<16} (no remarks)", entry.awb);
                }
                for r in &entry.remarks {
                    println!(
                        "{:<16} {:<12} {:<10} {:<24} {:<32} {}",
                        r.awb,
                        r.service_center,
                        r.rca_type,
                        r.updated_on.format("%Y-%m-%d %H:%M:%S"),
                        r.updated_by,
                        r.remark
                    );
                }
            }
        }
        OutputFormat::Plain => {
            for entry in &tracked {
                match entry.first_seen {
                    Some(first) => println!(
                        "{} ({} remarks, first seen {})",
                        entry.awb,
                        entry.remarks.len(),
                        format_timestamp(first)
                    ),
                    None => println!("{} (no remarks)", entry.awb),
                }
                for r in &entry.remarks {
                    println!(
                        "  [{}] {} {} by {}: {}",
                        format_timestamp(r.updated_on),
                        r.service_center,
                        r.rca_type,
                        r.updated_by,
                        r.remark
                    );
                }
            }
        }
    }
    Ok(())
}

fn handle_submit(
    ledger: &mut Ledger,
    ctx: &RequestContext,
    cmd: &SubmitCommand,
) -> anyhow::Result<()> {
    let submission = BatchSubmission {
        awbs: cmd.input.collect()?,
        service_center: cmd.service_center.clone(),
        rca_type: cmd.rca_type.into(),
        email_subject: cmd.subject.clone(),
        remark: cmd.remark.clone(),
    };
    if submission.awbs.is_empty() {
        bail!("no AWBs given");
    }

    let report = ledger.submit_batch(ctx, &submission)?;
    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Appended:  {}", report.appended);
    println!("Evicted:   {}", report.evicted);
    if report.truncated > 0 {
        println!("Dropped:   {} (over batch limit)", report.truncated);
    }
    for rejected in &report.rejected {
        println!("Rejected:  #{} '{}': {}", rejected.index, rejected.awb, rejected.reason);
    }
    Ok(())
}

fn handle_summary(ledger: &Ledger, ctx: &RequestContext, cmd: &SummaryCommand) -> anyhow::Result<()> {
    let by_center = ledger.group_summary()?;
    let dashboard = ledger.dashboard()?;
    let activity = if cmd.logins {
        Some(ledger.login_activity(ctx)?)
    } else {
        None
    };

    if cmd.json {
        let summary = serde_json::json!({
            "dashboard": dashboard,
            "service_centers": by_center,
            "login_activity": activity,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("Live remarks:     {}", dashboard.total_records);
    println!("Archived remarks: {}", dashboard.deleted_records);
    println!("Users:            {}", dashboard.total_users);
    println!("Active users:     {}", dashboard.active_users);
    println!("Never logged in:  {}", dashboard.never_logged_in);
    println!();
    println!("{:<20} {:>8} {:>10}", "SERVICE CENTER", "REMARKS", "UPDATERS");
    for (center, s) in &by_center {
        println!("{center:<20} {:>8} {:>10}", s.count, s.distinct_updaters);
    }

    if let Some(activity) = activity {
        println!();
        println!("Daily logins:");
        for (day, n) in &activity.daily {
            println!("  {day}  {n}");
        }
        println!("Monthly logins:");
        for (month, n) in &activity.monthly {
            println!("  {month}  {n}");
        }
    }
    Ok(())
}

fn handle_export(
    ledger: &Ledger,
    ctx: &RequestContext,
    config: &Config,
    cmd: &ExportCommand,
) -> anyhow::Result<()> {
    let path = cmd
        .output
        .clone()
        .unwrap_or_else(|| config.export.file_name.clone().into());
    let summary = export::export_workbook(ledger, ctx, &path)?;
    println!(
        "Wrote {} ({} remarks, {} archived, {} logins)",
        path.display(),
        summary.records,
        summary.deleted,
        summary.logins
    );
    Ok(())
}

fn handle_user(ledger: &Ledger, ctx: &RequestContext, cmd: &UserCommand) -> anyhow::Result<()> {
    match cmd {
        UserCommand::Bootstrap { .. } => bail!("bootstrap does not take a login"),
        UserCommand::Create {
            email,
            name,
            role,
            new_password,
        } => {
            let user = ledger.create_user(ctx, email, name, (*role).into(), new_password)?;
            println!("Created {} user {}", user.role, user.email);
        }
        UserCommand::Passwd { new_password } => {
            ledger.change_password(ctx, new_password)?;
            println!("Password changed.");
        }
        UserCommand::List { json } => {
            let users = ledger.list_users(ctx)?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&users)?);
            } else {
                println!("{:<32} {:<24} {:<10} CREATED", "EMAIL", "NAME", "ROLE");
                for u in &users {
                    println!(
                        "{:<32} {:<24} {:<10} {}",
                        u.email,
                        u.name,
                        u.role,
                        u.created_on.format("%Y-%m-%d")
                    );
                }
            }
        }
    }
    Ok(())
}

fn handle_status(config: &Config, cmd: &StatusCommand) -> anyhow::Result<()> {
    let ledger = Ledger::open(config)?;
    let stats = ledger.storage().stats()?;
    let over_capacity = ledger.over_capacity()?;

    if cmd.json {
        let status = serde_json::json!({
            "database_path": config.database_path(),
            "max_remarks_per_awb": ledger.policy().max_per_awb(),
            "stats": stats,
            "awbs_over_capacity": over_capacity,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("rcal status");
        println!("-----------");
        println!("Database:         {}", config.database_path().display());
        println!("Size:             {} bytes", stats.db_size_bytes);
        println!("Cap per AWB:      {}", ledger.policy().max_per_awb());
        println!("Live remarks:     {}", stats.live_remarks);
        println!("Archived remarks: {}", stats.deleted_remarks);
        println!("Tracked AWBs:     {}", stats.tracked_awbs);
        println!("Users:            {}", stats.users);
        println!("Login events:     {}", stats.login_events);
        if !over_capacity.is_empty() {
            println!("Over cap AWBs:    {} (trimmed on next append)", over_capacity.len());
        }
        if let (Some(oldest), Some(newest)) = (stats.oldest_remark, stats.newest_remark) {
            println!("Oldest remark:    {}", format_timestamp(oldest));
            println!("Newest remark:    {}", format_timestamp(newest));
        }
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: &ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if *json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path:        {}", config.database_path().display());
                println!("  Busy timeout (ms):    {}", config.storage.busy_timeout_ms);
                println!();
                println!("[Ledger]");
                println!("  Max remarks per AWB:  {}", config.ledger.max_remarks_per_awb);
                println!("  Max batch size:       {}", config.ledger.max_batch_size);
                println!(
                    "  AWB pattern:          {}",
                    config.ledger.awb_pattern.as_deref().unwrap_or("(none)")
                );
                println!();
                println!("[Retention]");
                println!("  Retention (days):     {}", config.retention.retention_days);
                println!();
                println!("[Export]");
                println!("  File name:            {}", config.export.file_name);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { .. } => {}
    }
    Ok(())
}

fn handle_validate(file: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let path = file.unwrap_or_else(Config::default_config_path);
    println!("Validating configuration: {}", path.display());
    Config::load_from(Some(path.clone()))
        .with_context(|| format!("configuration at {} is invalid", path.display()))?;
    println!("Configuration is valid.");
    Ok(())
}
