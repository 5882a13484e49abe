use anyhow::Context;
use chrono::Datelike;
use clap::Parser;
use lcr_reports::adapters::http::{LcrClient, MinisteringOrganization};
use lcr_reports::config::cli::{Command, Endpoint};
use lcr_reports::core::aggregator::{FailurePolicy, HistoricalReportAggregator};
use lcr_reports::domain::model::{ReportingPeriod, Unit};
use lcr_reports::domain::ports::ConfigProvider;
use lcr_reports::utils::error::{EtlError, ErrorSeverity};
use lcr_reports::utils::{logger, validation::Validate};
use lcr_reports::{AnalyzePipeline, CliConfig, EtlEngine, LocalStorage, Profile, ReportPipeline};
use std::path::Path;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliConfig::parse();

    let mut profile = match Profile::from_file(&args.profile) {
        Ok(profile) => profile,
        Err(e) => {
            eprintln!("❌ Failed to load profile '{}': {}", args.profile, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    if args.json_logs || profile.json_logs() {
        logger::init_json_logger(args.verbose);
    } else {
        logger::init_cli_logger(args.verbose);
    }

    tracing::info!("🚀 Starting lcr-reports");
    tracing::info!("📁 Loaded profile from: {}", args.profile);

    let command = args.command.clone().unwrap_or_default();
    // Fetch writes its JSON to stdout, so status lines stay on stderr there.
    let stdout_is_data = matches!(command, Command::Fetch { .. });
    let result = match command {
        Command::Download {
            start_year,
            output,
            skip_failed,
            dry_run,
        } => {
            if let Some(year) = start_year {
                profile.analytics.start_year = year;
            }
            if let Some(output) = output {
                profile.load.output_path = output;
            }
            if skip_failed {
                let handling = profile.error_handling.get_or_insert_with(Default::default);
                handling.on_period_failure = FailurePolicy::Skip;
            }
            validate_or_exit(&profile);
            display_profile_summary(&profile, dry_run);

            if dry_run {
                tracing::info!("🔍 DRY RUN MODE - nothing will be downloaded");
                perform_dry_run(&profile)?;
                return Ok(());
            }
            run_download(profile).await
        }
        Command::Analyze { input, start_year } => {
            if let Some(year) = start_year {
                profile.analytics.start_year = year;
            }
            validate_or_exit(&profile);
            run_analyze(profile, input).await
        }
        Command::Fetch {
            endpoint,
            month,
            months,
            organization,
            unit,
            period,
            member_id,
            out,
        } => {
            validate_or_exit(&profile);
            let request = FetchRequest {
                endpoint,
                month: month.unwrap_or_else(|| chrono::Local::now().month()),
                months,
                organization,
                unit,
                period,
                member_id,
                out,
            };
            run_fetch(&profile, request).await
        }
    };

    match result {
        Ok(message) => {
            tracing::info!("✅ {}", message);
            if stdout_is_data {
                eprintln!("✅ {}", message);
            } else {
                println!("✅ {}", message);
            }
        }
        Err(e) => exit_with(e),
    }

    Ok(())
}

fn validate_or_exit(profile: &Profile) {
    if let Err(e) = profile.validate() {
        tracing::error!("❌ Profile validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }
    tracing::info!("✅ Profile validated");
}

fn exit_with(e: EtlError) {
    tracing::error!(
        "❌ Run failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());

    let exit_code = match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    };

    if exit_code > 0 {
        std::process::exit(exit_code);
    }
}

async fn run_download(profile: Profile) -> lcr_reports::Result<String> {
    let authenticator = profile.authenticator()?;
    let units = profile.load_units()?;
    let policy = profile.failure_policy();

    tracing::info!("🔐 Logging in to {}", profile.source.base_url);
    let client = LcrClient::connect(profile.client_settings(), authenticator.as_ref()).await?;

    let aggregator = HistoricalReportAggregator::new(client).with_policy(policy);
    let storage = LocalStorage::new(profile.output_path().to_string());
    let pipeline = ReportPipeline::new(aggregator, units.units().to_vec(), storage, profile);

    let output_path = EtlEngine::new(pipeline).run().await?;
    Ok(format!("Output saved to: {}", output_path))
}

async fn run_analyze(mut profile: Profile, input: Option<String>) -> lcr_reports::Result<String> {
    let input = input.unwrap_or_else(|| {
        Path::new(profile.output_path())
            .join(profile.output_filename())
            .to_string_lossy()
            .into_owned()
    });
    let input_path = Path::new(&input);
    let file_name = input_path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| EtlError::InvalidConfigValueError {
            field: "input".to_string(),
            value: input.clone(),
            reason: "not a file path".to_string(),
        })?
        .to_string();
    let parent = input_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .to_string_lossy()
        .into_owned();

    // Charts land next to the input file.
    profile.load.output_path = parent.clone();
    let storage = LocalStorage::new(parent);
    let pipeline = AnalyzePipeline::new(file_name, storage, profile);

    let output_path = EtlEngine::new(pipeline).run().await?;
    Ok(format!("Chart data saved to: {}", output_path))
}

struct FetchRequest {
    endpoint: Endpoint,
    month: u32,
    months: u32,
    organization: Option<String>,
    unit: Option<u32>,
    period: Option<String>,
    member_id: Option<u64>,
    out: String,
}

async fn run_fetch(profile: &Profile, request: FetchRequest) -> lcr_reports::Result<String> {
    let authenticator = profile.authenticator()?;
    let client = LcrClient::connect(profile.client_settings(), authenticator.as_ref()).await?;
    let unit_number = request.unit.unwrap_or(profile.profile.unit_number);

    let value = match request.endpoint {
        Endpoint::BirthdayList => client.birthday_list(request.month, request.months).await?,
        Endpoint::MovedIn => client.members_moved_in(request.months).await?,
        Endpoint::MovedOut => client.members_moved_out(request.months).await?,
        Endpoint::MemberList => client.member_list().await?,
        Endpoint::Callings => client.callings().await?,
        Endpoint::Ministering => {
            let organization = request
                .organization
                .as_deref()
                .map(str::parse::<MinisteringOrganization>)
                .transpose()?;
            client.ministering(organization).await?
        }
        Endpoint::AccessTable => client.access_table().await?,
        Endpoint::RecommendStatus => client.recommend_status().await?,
        Endpoint::Quarters => {
            let unit = Unit::new(profile.profile.unit_name.as_str(), unit_number)?;
            let periods = client.available_report_quarters(&unit).await?;
            serde_json::to_value(periods)?
        }
        Endpoint::QuarterlyReport => {
            let period: ReportingPeriod = request
                .period
                .as_deref()
                .ok_or_else(|| EtlError::MissingConfigError {
                    field: "--period".to_string(),
                })?
                .parse()?;
            let report = client
                .quarterly_report_for(unit_number, period.quarter(), period.year())
                .await?;
            serde_json::to_value(report)?
        }
        Endpoint::Photo => {
            let member_id = request.member_id.ok_or_else(|| EtlError::MissingConfigError {
                field: "--member-id".to_string(),
            })?;
            let bytes = client.individual_photo(member_id).await?;
            std::fs::write(&request.out, &bytes)?;
            return Ok(format!("Photo saved to: {}", request.out));
        }
    };

    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(format!("Fetched {:?}", request.endpoint))
}

fn display_profile_summary(profile: &Profile, dry_run: bool) {
    println!("📋 Profile Summary:");
    println!(
        "  Unit: {} ({})",
        profile.profile.unit_name, profile.profile.unit_number
    );
    println!("  Source: {}", profile.source.base_url);
    println!("  Auth: {:?}", profile.auth.method);
    println!("  Output: {}/{}", profile.output_path(), profile.output_filename());
    println!("  Charts from: {}", profile.start_year());
    println!("  On period failure: {:?}", profile.failure_policy());

    if let Some(archive) = profile.archive_filename() {
        println!("  Archive: {}", archive);
    }

    if dry_run {
        println!("  🔍 DRY RUN MODE ENABLED");
    }
}

fn perform_dry_run(profile: &Profile) -> anyhow::Result<()> {
    let units = profile
        .load_units()
        .context("failed to load the unit registry")?;

    println!("\n🔍 Dry Run Analysis:");
    println!("  Units to download: {}", units.len());
    for unit in units.units() {
        println!("    - {} ({})", unit.name(), unit.number());
    }
    println!("  Derived metrics:");
    for metric in profile.metrics() {
        println!("    - {}", metric.name());
    }

    println!("\n✅ Dry run completed - profile looks good!");
    Ok(())
}
