#![cfg(not(tarpaulin_include))]

use eventeye::certificate::{CertificateRequest, generate_certificate};
use eventeye::csv_import::load_participants_csv;
use eventeye::participant::participant_id;
use eventeye::{AppConfig, RenderOptions};
use log::{error, info, warn};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

const USAGE: &str = "Usage:
  certgen single <name> [options]
  certgen batch <file.csv> <out dir> [options]

Options:
  --template <1-7>     Certificate design (default 1)
  --lang <en|hi>       Certificate language (default en)
  --event <id>         Event id
  --title <title>      Event title
  --date <date>        Event date as printed
  --organizer <name>   Organizer name
  --font <file.ttf>    Unicode font for non-Latin text
  --out <file.pdf>     Output file (single only)";

#[derive(Default)]
struct Options {
    template: Option<u32>,
    language: Option<String>,
    event: Option<String>,
    title: Option<String>,
    date: Option<String>,
    organizer: Option<String>,
    font: Option<PathBuf>,
    out: Option<PathBuf>,
}

fn parse_options(args: &[String]) -> Result<Options, String> {
    let mut options = Options::default();
    let mut iter = args.iter();
    while let Some(flag) = iter.next() {
        let value = iter
            .next()
            .ok_or_else(|| format!("Missing value for {flag}"))?
            .clone();
        match flag.as_str() {
            "--template" => {
                options.template = Some(
                    value
                        .parse()
                        .map_err(|_| format!("Invalid template id: {value}"))?,
                )
            }
            "--lang" => options.language = Some(value),
            "--event" => options.event = Some(value),
            "--title" => options.title = Some(value),
            "--date" => options.date = Some(value),
            "--organizer" => options.organizer = Some(value),
            "--font" => options.font = Some(PathBuf::from(value)),
            "--out" => options.out = Some(PathBuf::from(value)),
            other => return Err(format!("Unknown option: {other}")),
        }
    }
    Ok(options)
}

fn base_request(options: &Options, config: &AppConfig) -> CertificateRequest {
    let mut request = CertificateRequest::default();
    if let Some(id) = options.template {
        request.template_id = id;
    }
    if let Some(lang) = &options.language {
        request.language = lang.clone();
    }
    request.event.id = Some(
        options
            .event
            .clone()
            .unwrap_or_else(|| config.default_event_id.clone()),
    );
    request.event.title = Some(
        options
            .title
            .clone()
            .unwrap_or_else(|| config.event_title.clone()),
    );
    request.event.date = options.date.clone();
    request.organizer = Some(
        options
            .organizer
            .clone()
            .unwrap_or_else(|| config.organizer.clone()),
    );
    request
}

fn write_pdf(path: &Path, pdf: &[u8]) -> Result<(), String> {
    fs::write(path, pdf).map_err(|e| format!("Could not write {}: {e}", path.display()))
}

fn single(name: &str, options: &Options, config: &AppConfig, render: &RenderOptions) -> Result<(), String> {
    let mut request = base_request(options, config);
    request.participant.name = Some(name.to_string());

    let cert = generate_certificate(&request, render).map_err(|e| e.to_string())?;
    let out = options
        .out
        .clone()
        .unwrap_or_else(|| PathBuf::from(&cert.file_name));
    write_pdf(&out, &cert.pdf)?;
    println!("{} -> {}", cert.certificate_id, out.display());
    Ok(())
}

fn batch(
    csv: &Path,
    out_dir: &Path,
    options: &Options,
    config: &AppConfig,
    render: &RenderOptions,
) -> Result<(), String> {
    let import = load_participants_csv(csv).map_err(|e| e.to_string())?;
    if import.issues_count() > 0 {
        warn!("{} names have formatting issues", import.issues_count());
    }
    fs::create_dir_all(out_dir).map_err(|e| e.to_string())?;

    let base = base_request(options, config);
    let event_id = base.event.id.clone().unwrap_or_default();
    let (mut written, mut failed) = (0, 0);

    for input in import.participants() {
        let id = participant_id(&input);
        let mut request = base.clone();
        request.participant.name = input.name.clone();
        request.participant.email = input.email.clone().filter(|e| !e.is_empty());
        request.verify_url = Some(config.verify_url(&event_id, &id));
        request.participant.id = Some(id);

        match generate_certificate(&request, render) {
            Ok(cert) => {
                write_pdf(&out_dir.join(&cert.file_name), &cert.pdf)?;
                info!("Wrote {}", cert.file_name);
                written += 1;
            }
            Err(e) => {
                error!("Certificate for {} failed: {e}", request.display_name());
                failed += 1;
            }
        }
    }

    println!("{written} certificates written to {}, {failed} failed", out_dir.display());
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = env::args().collect();
    let config = AppConfig::from_env();

    let result = match args.get(1).map(String::as_str) {
        Some("single") if args.len() >= 3 => parse_options(&args[3..]).and_then(|options| {
            let render = RenderOptions {
                unicode_font: options.font.clone().or_else(|| config.unicode_font.clone()),
            };
            single(&args[2], &options, &config, &render)
        }),
        Some("batch") if args.len() >= 4 => parse_options(&args[4..]).and_then(|options| {
            let render = RenderOptions {
                unicode_font: options.font.clone().or_else(|| config.unicode_font.clone()),
            };
            batch(
                Path::new(&args[2]),
                Path::new(&args[3]),
                &options,
                &config,
                &render,
            )
        }),
        _ => {
            eprintln!("{USAGE}");
            return ExitCode::FAILURE;
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
