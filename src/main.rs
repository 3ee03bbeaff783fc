use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde::Serialize;

use sagereport::auth::AuthGate;
use sagereport::config::Config;
use sagereport::identity::LocalIdentityProvider;
use sagereport::logging::{self, LogFormat};
use sagereport::models::{
    NewStudent, Report, ReportGenerationRequest, ReportId, ReportStatus, ReportType, ReportUpdate,
    Student, StudentId,
};
use sagereport::report;
use sagereport::router::{Navigation, NavigationGuard, Route};
use sagereport::seed;
use sagereport::store::ReportStore;
use sagereport::strategy::{NoLatency, RandomLatency};

#[derive(Parser)]
#[command(name = "sagereport")]
#[command(about = "Generate, review and manage student progress reports", long_about = None)]
struct Cli {
    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Log output format: pretty, compact or json
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,
    /// Skip the simulated generation latency
    #[arg(long, global = true)]
    no_latency: bool,
    /// Start without the demo roster and reports
    #[arg(long, global = true)]
    empty: bool,
    /// Import students from a name,grade,email CSV before running the command
    #[arg(long, global = true)]
    students_csv: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List enrolled students
    Students,
    /// Enroll a student
    AddStudent {
        #[arg(long)]
        name: String,
        #[arg(long)]
        grade: String,
        #[arg(long)]
        email: Option<String>,
    },
    /// List reports
    Reports {
        #[arg(long)]
        status: Option<ReportStatus>,
    },
    /// Show one report in full
    Show {
        #[arg(long)]
        id: String,
    },
    /// Generate a report from a category template
    Generate {
        #[arg(long)]
        student: String,
        /// progress, behavioral, academic or iep
        #[arg(long = "type", default_value = "progress")]
        report_type: String,
        #[arg(long)]
        period: String,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long = "strength")]
        strengths: Vec<String>,
        #[arg(long = "growth")]
        areas_for_growth: Vec<String>,
    },
    /// Edit a report's title, content or status
    Update {
        #[arg(long)]
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        content: Option<String>,
        #[arg(long)]
        status: Option<ReportStatus>,
    },
    /// Delete a report
    Delete {
        #[arg(long)]
        id: String,
    },
    /// Render the dashboard as markdown
    Dashboard {
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Check whether a path may be entered
    Navigate {
        #[arg(long)]
        path: String,
        /// Sign in as the demo user first
        #[arg(long)]
        demo_user: bool,
    },
    /// Walk through sign-in, generation, review and the dashboard
    Demo,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env().context("invalid SAGEREPORT_* environment")?;

    let filter = logging::filter_for_verbosity(cli.verbose, &config.log_filter);
    logging::init_logging(&filter, cli.log_format.unwrap_or(config.log_format))
        .context("failed to initialise logging")?;

    let store = build_store(&cli, &config)?;

    match cli.command {
        Commands::Students => {
            let students = store.students();
            print_output(cli.json, &students, || {
                if students.is_empty() {
                    println!("No students enrolled.");
                }
                for student in &students {
                    print_student(student);
                }
            })?;
        }
        Commands::AddStudent { name, grade, email } => {
            let student = store.add_student(NewStudent { name, grade, email });
            print_output(cli.json, &student, || {
                println!("Added student {}.", student.id);
                print_student(&student);
            })?;
        }
        Commands::Reports { status } => {
            let reports = match status {
                Some(status) => store.reports_with_status(status),
                None => store.reports(),
            };
            print_output(cli.json, &reports, || {
                if reports.is_empty() {
                    println!("No reports found.");
                }
                for report in &reports {
                    print_report_line(report);
                }
            })?;
        }
        Commands::Show { id } => {
            let Some(report) = store.get_report(&ReportId::new(id.as_str())) else {
                bail!("no report with id {id}");
            };
            print_output(cli.json, &report, || print_report(&report))?;
        }
        Commands::Generate {
            student,
            report_type,
            period,
            notes,
            strengths,
            areas_for_growth,
        } => {
            let request = ReportGenerationRequest {
                student_id: StudentId::new(student),
                report_type: ReportType::parse(&report_type),
                period,
                notes,
                strengths: Some(strengths).filter(|s| !s.is_empty()),
                areas_for_growth: Some(areas_for_growth).filter(|s| !s.is_empty()),
            };
            let store = Arc::new(store);
            let report = generate_with_progress(&store, request).await?;
            print_output(cli.json, &report, || print_report(&report))?;
        }
        Commands::Update {
            id,
            title,
            content,
            status,
        } => {
            let update = ReportUpdate {
                title,
                content,
                status,
                student_name: None,
            };
            if update.is_empty() {
                bail!("nothing to update; pass --title, --content or --status");
            }
            match store.update_report(&ReportId::new(id.as_str()), update) {
                Some(report) => print_output(cli.json, &report, || print_report_line(&report))?,
                None => println!("No report with id {id}; nothing changed."),
            }
        }
        Commands::Delete { id } => {
            let removed = store.delete_report(&ReportId::new(id.as_str()));
            print_output(cli.json, &serde_json::json!({ "id": id, "removed": removed }), || {
                if removed {
                    println!("Deleted report {id}.");
                } else {
                    println!("No report with id {id}; nothing changed.");
                }
            })?;
        }
        Commands::Dashboard { out } => {
            let markdown = report::build_dashboard(&store, Utc::now());
            match out {
                Some(path) => {
                    std::fs::write(&path, markdown)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    println!("Dashboard written to {}.", path.display());
                }
                None => print!("{markdown}"),
            }
        }
        Commands::Navigate { path, demo_user } => {
            let gate = AuthGate::new(Arc::new(LocalIdentityProvider::new()));
            gate.initialize().await?;
            if demo_user {
                gate.demo_sign_in();
            }
            let route = Route::resolve(&path).with_context(|| format!("no route matches {path}"))?;
            let decision = NavigationGuard::new(&gate).before_each(&route);
            print_output(cli.json, &serde_json::json!({ "route": route, "navigation": decision }), || {
                print_navigation(&route, decision)
            })?;
        }
        Commands::Demo => run_demo(store).await?,
    }

    Ok(())
}

fn build_store(cli: &Cli, config: &Config) -> anyhow::Result<ReportStore> {
    let store = if config.demo_data && !cli.empty {
        seed::demo_store()
    } else {
        ReportStore::default()
    };
    let store = if cli.no_latency {
        store.with_latency(NoLatency)
    } else {
        store.with_latency(RandomLatency::new(config.latency_min(), config.latency_max()))
    };

    if let Some(path) = &cli.students_csv {
        seed::import_students(&store, path)
            .with_context(|| format!("failed to import students from {}", path.display()))?;
    }

    Ok(store)
}

/// Runs a generation request, printing a dot to stderr while it is pending.
async fn generate_with_progress(
    store: &Arc<ReportStore>,
    request: ReportGenerationRequest,
) -> anyhow::Result<Report> {
    let task = {
        let store = Arc::clone(store);
        tokio::spawn(async move { store.generate_report(request).await })
    };

    eprint!("Generating report");
    let mut ticker = tokio::time::interval(Duration::from_millis(250));
    while !task.is_finished() {
        ticker.tick().await;
        if store.is_generating() {
            eprint!(".");
        }
    }
    eprintln!();

    let report = task.await.context("generation task failed")??;
    Ok(report)
}

async fn run_demo(store: ReportStore) -> anyhow::Result<()> {
    let store = Arc::new(store);
    let gate = AuthGate::new(Arc::new(LocalIdentityProvider::new()));
    gate.initialize().await?;

    println!("== Navigation while signed out");
    for path in ["/dashboard", "/login"] {
        let route = Route::resolve(path).with_context(|| format!("no route matches {path}"))?;
        print_navigation(&route, NavigationGuard::new(&gate).before_each(&route));
    }

    let user = gate.demo_sign_in();
    println!();
    println!("== Signed in as {}", user.display_name());
    for path in ["/login", "/reports/new"] {
        let route = Route::resolve(path).with_context(|| format!("no route matches {path}"))?;
        print_navigation(&route, NavigationGuard::new(&gate).before_each(&route));
    }

    let Some(student) = store.students().into_iter().next() else {
        bail!("the demo needs at least one student; drop --empty or pass --students-csv");
    };
    let mut request = ReportGenerationRequest::new(student.id.clone(), ReportType::Progress, "Q2");
    request.strengths = Some(vec!["Asks thoughtful questions".to_string()]);
    request.notes = Some("Shared a science project with the class.".to_string());

    println!();
    println!("== Generating a Q2 progress report for {}", student.name);
    let generated = generate_with_progress(&store, request).await?;
    print_report(&generated);

    for status in [ReportStatus::Reviewed, ReportStatus::Sent] {
        if let Some(report) = store.update_report(&generated.id, ReportUpdate::status(status)) {
            println!("Report {} marked {}.", report.id, report.status);
        }
    }

    println!();
    print!("{}", report::build_dashboard(&store, Utc::now()));

    gate.sign_out().await?;
    let route = Route::resolve("/dashboard").with_context(|| "no route matches /dashboard")?;
    println!();
    println!("== Signed out");
    print_navigation(&route, NavigationGuard::new(&gate).before_each(&route));
    Ok(())
}

fn print_output<T: Serialize>(json: bool, value: &T, text: impl FnOnce()) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        text();
    }
    Ok(())
}

fn print_student(student: &Student) {
    match &student.email {
        Some(email) => println!("- [{}] {} ({}) <{}>", student.id, student.name, student.grade, email),
        None => println!("- [{}] {} ({})", student.id, student.name, student.grade),
    }
}

fn print_report_line(report: &Report) {
    println!(
        "- [{}] {} for {} ({}, updated {})",
        report.id,
        report.title,
        report.student_name,
        report.status,
        report.updated_at.format("%Y-%m-%d %H:%M")
    );
}

fn print_report(report: &Report) {
    println!("# {}", report.title);
    println!(
        "Report {} for {} | status {} | created {} | updated {}",
        report.id,
        report.student_name,
        report.status,
        report.created_at.format("%Y-%m-%d %H:%M"),
        report.updated_at.format("%Y-%m-%d %H:%M")
    );
    println!();
    println!("{}", report.content);
}

fn print_navigation(route: &Route, decision: Navigation) {
    match decision {
        Navigation::Allow => println!("{} -> allowed", route.path),
        Navigation::Redirect(to) => println!("{} -> redirect to {}", route.path, to),
    }
}
