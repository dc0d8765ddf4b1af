use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    FileSelectionStore, GalleryLoad, GalleryWorkflow, HttpPhotoService, LocalFile, Notice,
    NoticeLevel, PreviewRegistry, SearchState, SearchWorkflow, UploadMode, UploadOutcome,
    UploadState, UploadWorkflow,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;

use config::{load_settings, Settings};

#[derive(Parser, Debug)]
#[command(name = "facefind", about = "Upload group photos and find people in them")]
struct Args {
    /// Config file; defaults to ./facefind.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    service_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload one group photo.
    Upload { file: PathBuf },
    /// Upload several group photos in one request.
    UploadBulk {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// List uploaded group photos.
    Gallery,
    /// Find a person using a reference image.
    Find {
        file: PathBuf,
        #[arg(long)]
        tolerance: Option<f64>,
    },
    /// Remove a photo from the gallery after confirmation.
    Delete {
        filename: String,
        #[arg(long)]
        yes: bool,
        /// Also delete the photo on the service.
        #[arg(long)]
        remote: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = load_settings(args.config.as_deref())?;
    if let Some(service_url) = args.service_url {
        settings.service_url = service_url;
    }
    info!(service_url = %settings.service_url, "facefind: starting");

    let service = HttpPhotoService::with_timeout(&settings.service_url, settings.request_timeout())
        .with_context(|| format!("invalid service url '{}'", settings.service_url))?;
    let registry = PreviewRegistry::new();

    match args.command {
        Command::Upload { file } => {
            upload(&service, &registry, &settings, vec![file], UploadMode::Single).await
        }
        Command::UploadBulk { files } => {
            upload(&service, &registry, &settings, files, UploadMode::Bulk).await
        }
        Command::Gallery => gallery(&service, &settings).await,
        Command::Find { file, tolerance } => {
            find(&service, &registry, &settings, file, tolerance).await
        }
        Command::Delete {
            filename,
            yes,
            remote,
        } => delete(&service, &settings, &filename, yes, remote).await,
    }
}

async fn read_files(paths: Vec<PathBuf>) -> Result<Vec<LocalFile>> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let file = LocalFile::read(&path)
            .await
            .with_context(|| format!("failed to read '{}'", path.display()))?;
        files.push(file);
    }
    Ok(files)
}

async fn upload(
    service: &HttpPhotoService,
    registry: &PreviewRegistry,
    settings: &Settings,
    paths: Vec<PathBuf>,
    mode: UploadMode,
) -> Result<()> {
    let mut store = FileSelectionStore::new(registry.clone());
    let options = settings.selection_options(mode == UploadMode::Bulk);
    let outcome = store.add_files(read_files(paths).await?, &options);
    for rejection in &outcome.rejected {
        let reasons = rejection
            .reasons
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        eprintln!("skipped {}: {reasons}", rejection.file_name);
    }

    let mut workflow = UploadWorkflow::new(settings.progress());
    let ticket = match workflow.begin_upload(&store, mode) {
        Ok(ticket) => ticket,
        Err(rejected) => {
            print_notices(workflow.take_notices());
            bail!(rejected);
        }
    };

    let mut progress = workflow.progress_simulator().subscribe();
    let reporter = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let current = *progress.borrow_and_update();
            eprintln!("uploading... {}% (simulated)", current.percent);
            if current.complete {
                break;
            }
        }
    });
    let completion = ticket.run(service).await;
    reporter.abort();
    workflow.complete(completion, &mut store);
    print_notices(workflow.take_notices());

    match workflow.state() {
        UploadState::Uploaded(UploadOutcome::Single(body)) => {
            println!("{}\t{}", body.filename, body.url.as_deref().unwrap_or("-"));
            Ok(())
        }
        UploadState::Uploaded(UploadOutcome::Bulk(body)) => {
            for file in &body.uploaded_files {
                println!("{}\t{}", file.filename, file.url.as_deref().unwrap_or("-"));
            }
            for failure in &body.errors {
                println!("{}\tFAILED: {}", failure.filename, failure.error);
            }
            Ok(())
        }
        UploadState::UploadFailed(err) => Err(anyhow!("{err}")),
        UploadState::Idle | UploadState::Uploading => Ok(()),
    }
}

async fn gallery(service: &HttpPhotoService, settings: &Settings) -> Result<()> {
    let mut workflow = GalleryWorkflow::new(settings.fallback_policy());
    let load = workflow.load(service).await;
    print_notices(workflow.take_notices());

    match load {
        GalleryLoad::Live { count } => println!("{count} photo(s)"),
        GalleryLoad::Fallback { count } => println!("{count} demo photo(s) (service unavailable)"),
        GalleryLoad::Failed => bail!("failed to load photos"),
    }
    print_photos(&workflow);
    Ok(())
}

async fn find(
    service: &HttpPhotoService,
    registry: &PreviewRegistry,
    settings: &Settings,
    path: PathBuf,
    tolerance: Option<f64>,
) -> Result<()> {
    let reference = LocalFile::read(&path)
        .await
        .with_context(|| format!("failed to read '{}'", path.display()))?;
    let mut workflow = SearchWorkflow::new(registry.clone())
        .with_options(settings.selection_options(false))
        .with_tolerance(tolerance.unwrap_or(settings.default_tolerance));
    if let Err(rejection) = workflow.select_reference(reference) {
        bail!(
            "{} rejected: {:?}",
            rejection.file_name,
            rejection.reasons
        );
    }

    let searched = workflow.search(service).await.map(|_| ());
    print_notices(workflow.take_notices());
    searched?;

    match workflow.state() {
        SearchState::ResultsReady(result) => {
            println!(
                "tolerance {} | {} image(s) checked | {} match(es)",
                result.tolerance_used,
                result.total_images_checked,
                result.matches.len()
            );
            for face_match in &result.matches {
                let location = face_match.face_location;
                println!(
                    "{:>6.1}%\t{}\t[{}, {}, {}, {}]",
                    face_match.confidence,
                    face_match.display_url(),
                    location.x(),
                    location.y(),
                    location.width(),
                    location.height()
                );
            }
            Ok(())
        }
        SearchState::SearchFailed(err) => Err(anyhow!("{err}")),
        other => bail!("search ended in unexpected state {}", other.name()),
    }
}

async fn delete(
    service: &HttpPhotoService,
    settings: &Settings,
    filename: &str,
    yes: bool,
    remote: bool,
) -> Result<()> {
    let mut workflow = GalleryWorkflow::new(settings.fallback_policy());
    workflow.load(service).await;
    print_notices(workflow.take_notices());

    let photo = workflow
        .photos()
        .iter()
        .find(|photo| photo.filename == filename)
        .cloned()
        .ok_or_else(|| anyhow!("no photo named '{filename}' in the gallery"))?;
    workflow.request_delete(&photo)?;

    if !yes && !confirm(&format!("Delete {filename}? This action cannot be undone. [y/N] ")).await? {
        workflow.cancel_delete();
        println!("cancelled");
        return Ok(());
    }

    let deleted = if remote || settings.remote_delete {
        workflow.confirm_delete_remote(service).await
    } else {
        workflow.confirm_delete()
    };
    print_notices(workflow.take_notices());
    deleted?;
    print_photos(&workflow);
    Ok(())
}

async fn confirm(prompt: &str) -> Result<bool> {
    eprint!("{prompt}");
    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .context("failed to read confirmation")?;
    Ok(matches!(line.trim(), "y" | "Y" | "yes"))
}

fn print_photos(workflow: &GalleryWorkflow) {
    for photo in workflow.photos() {
        let size = photo
            .size
            .map(|size| size.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("{}\t{size}\t{}", photo.filename, photo.url);
    }
}

fn print_notices(notices: Vec<Notice>) {
    for notice in notices {
        match notice.level {
            NoticeLevel::Success => eprintln!("ok: {}", notice.message),
            NoticeLevel::Error => eprintln!("error: {}", notice.message),
        }
    }
}
