//! clinicall-cli — place clinic calls and read their analysis from the shell
//!
//! Talks to a running `clinicall-server` over HTTP.
//!
//! # Subcommands
//! - `call --phone <E.164> --clinic <name> --doctor <name> --speciality <s> --procedure <p>...`
//! - `analyze <call_id> [--json]` — analysis of a completed call
//! - `status`                     — show server health

use clap::{Parser, Subcommand};
use serde::Deserialize;

const DEFAULT_SERVER: &str = "http://127.0.0.1:8780";

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "clinicall-cli",
    version,
    about = "Place clinic calls and read call analyses"
)]
struct Cli {
    /// Clinicall HTTP server URL (overrides CLINICALL_HTTP_URL env var)
    #[arg(long, env = "CLINICALL_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Place an outbound call to a patient
    Call {
        /// Patient phone number in E.164 format, e.g. +15551234567
        #[arg(long)]
        phone: String,

        #[arg(long)]
        clinic: String,

        #[arg(long)]
        doctor: String,

        #[arg(long)]
        speciality: String,

        /// Procedure to mention; repeat for several
        #[arg(long = "procedure", required = true)]
        procedures: Vec<String>,

        /// Earliest dispatch time (RFC 3339); dials immediately when omitted
        #[arg(long)]
        at: Option<String>,
    },

    /// Fetch the analysis of a completed call
    Analyze {
        call_id: String,

        /// Print the raw JSON analysis
        #[arg(long)]
        json: bool,
    },

    /// Show Clinicall server status
    Status,
}

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct TranscriptLine {
    pub role: String,
    pub content: Option<String>,
    pub offset_seconds: Option<f64>,
}

/// Analysis as returned by GET /calls/:id/analysis
#[derive(Debug, Deserialize)]
pub struct Analysis {
    pub call_id: String,
    pub timestamp: Option<String>,
    pub duration_seconds: Option<f64>,
    pub status: String,
    pub customer_phone: Option<String>,
    #[serde(default)]
    pub main_topics: Vec<String>,
    #[serde(default)]
    pub customer_preferences: Vec<String>,
    #[serde(default)]
    pub customer_questions: Vec<String>,
    #[serde(default)]
    pub action_items: Vec<String>,
    pub overall_sentiment: Option<String>,
    #[serde(default)]
    pub appointment_confirmed: bool,
    #[serde(default)]
    pub transcript: Vec<TranscriptLine>,
}

#[derive(Debug, Deserialize)]
pub struct ApiError {
    pub error: String,
    pub call_status: Option<String>,
}

// ============================================================================
// Rendering
// ============================================================================

fn render_list(out: &mut String, title: &str, items: &[String]) {
    out.push_str(&format!("{}:\n", title));
    if items.is_empty() {
        out.push_str("  (none)\n");
    }
    for item in items {
        out.push_str(&format!("  - {}\n", item));
    }
}

/// Human-readable report of an analysis.
pub fn render_analysis(a: &Analysis) -> String {
    let mut out = String::new();
    out.push_str(&format!("Call:        {}\n", a.call_id));
    out.push_str(&format!("Status:      {}\n", a.status));
    out.push_str(&format!(
        "Started:     {}\n",
        a.timestamp.as_deref().unwrap_or("-")
    ));
    out.push_str(&format!(
        "Duration:    {}\n",
        a.duration_seconds
            .map(|d| format!("{:.0}s", d))
            .unwrap_or_else(|| "-".to_string())
    ));
    out.push_str(&format!(
        "Customer:    {}\n",
        a.customer_phone.as_deref().unwrap_or("-")
    ));
    out.push_str(&format!(
        "Sentiment:   {}\n",
        a.overall_sentiment.as_deref().unwrap_or("-")
    ));
    out.push_str(&format!(
        "Appointment: {}\n\n",
        if a.appointment_confirmed { "confirmed" } else { "not confirmed" }
    ));

    render_list(&mut out, "Main topics", &a.main_topics);
    render_list(&mut out, "Preferences", &a.customer_preferences);
    render_list(&mut out, "Questions", &a.customer_questions);
    render_list(&mut out, "Action items", &a.action_items);

    if !a.transcript.is_empty() {
        out.push_str("\nTranscript:\n");
        for line in &a.transcript {
            let offset = line
                .offset_seconds
                .map(|s| format!("{:>7.1}s", s))
                .unwrap_or_else(|| "       -".to_string());
            out.push_str(&format!(
                "{} {:>9}: {}\n",
                offset,
                line.role,
                line.content.as_deref().unwrap_or("")
            ));
        }
    }

    out
}

/// One-line message for a non-2xx server answer.
pub fn describe_error(status: u16, body: &str) -> String {
    match serde_json::from_str::<ApiError>(body) {
        Ok(ApiError {
            call_status: Some(call_status),
            ..
        }) => format!("call not ready (status: {})", call_status),
        Ok(e) => format!("server returned {}: {}", status, e.error),
        Err(_) => format!("server returned {}: {}", status, body),
    }
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

fn http_client(timeout_secs: u64) -> anyhow::Result<reqwest::blocking::Client> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()?)
}

/// Place a call through POST /calls.
fn do_call(server: &str, body: serde_json::Value) -> anyhow::Result<()> {
    let client = http_client(30)?;
    let url = format!("{}/calls", server);

    let resp = match client.post(&url).json(&body).send() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("clinicall-cli: connection failed to {}: {}", url, e);
            std::process::exit(1);
        }
    };

    let status = resp.status();
    let text = resp.text().unwrap_or_default();
    if !status.is_success() {
        eprintln!("clinicall-cli: {}", describe_error(status.as_u16(), &text));
        std::process::exit(1);
    }

    let created: serde_json::Value = serde_json::from_str(&text)?;
    println!("{}", created["call_id"].as_str().unwrap_or(""));
    Ok(())
}

/// URL of GET /calls/:id/analysis with the call id as a single path segment.
pub fn analysis_url(server: &str, call_id: &str) -> anyhow::Result<reqwest::Url> {
    if call_id.trim().is_empty() || call_id == "." || call_id == ".." {
        anyhow::bail!("'{}' is not a valid call id", call_id);
    }

    let mut url = reqwest::Url::parse(server)?;
    url.path_segments_mut()
        .map_err(|_| anyhow::anyhow!("server URL cannot carry a path: {}", server))?
        .pop_if_empty()
        .extend(["calls", call_id, "analysis"]);
    Ok(url)
}

/// Fetch an analysis through GET /calls/:id/analysis.
fn do_analyze(server: &str, call_id: &str, json_output: bool) -> anyhow::Result<()> {
    let client = http_client(30)?;
    let url = analysis_url(server, call_id)?;

    let resp = match client.get(url.clone()).send() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("clinicall-cli: connection failed to {}: {}", url, e);
            std::process::exit(1);
        }
    };

    let status = resp.status();
    let text = resp.text().unwrap_or_default();
    if !status.is_success() {
        eprintln!("clinicall-cli: {}", describe_error(status.as_u16(), &text));
        std::process::exit(1);
    }

    if json_output {
        let value: serde_json::Value = serde_json::from_str(&text)?;
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        let analysis: Analysis = serde_json::from_str(&text)?;
        print!("{}", render_analysis(&analysis));
    }

    Ok(())
}

/// Show the server status by calling GET /health.
fn do_status(server: &str) -> anyhow::Result<()> {
    let client = http_client(10)?;
    let url = format!("{}/health", server);

    match client.get(&url).send() {
        Ok(r) if r.status().is_success() => {
            let body: serde_json::Value = r.json().unwrap_or_default();
            println!("Clinicall server: {}", body["status"].as_str().unwrap_or("unknown"));
            println!("Version:          {}", body["version"].as_str().unwrap_or("?"));
            println!("Backend:          {}", body["backend"].as_str().unwrap_or("?"));
            println!(
                "Credentials:      {}",
                if body["vapi_configured"].as_bool().unwrap_or(false) {
                    "configured"
                } else {
                    "incomplete"
                }
            );
        }
        Ok(r) => {
            eprintln!("clinicall-cli: server unhealthy (HTTP {})", r.status());
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("clinicall-cli: cannot reach {}: {}", url, e);
            std::process::exit(1);
        }
    }

    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();
    let server = cli.server.trim_end_matches('/').to_string();

    let result = match cli.command {
        Commands::Call {
            phone,
            clinic,
            doctor,
            speciality,
            procedures,
            at,
        } => do_call(
            &server,
            serde_json::json!({
                "phone_number": phone,
                "clinic_name": clinic,
                "doctor_name": doctor,
                "speciality": speciality,
                "procedures": procedures,
                "scheduled_at": at,
            }),
        ),
        Commands::Analyze { call_id, json } => do_analyze(&server, &call_id, json),
        Commands::Status => do_status(&server),
    };

    if let Err(e) = result {
        eprintln!("clinicall-cli: {}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================
