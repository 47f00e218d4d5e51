//! pagepress – command-line Markdown resume → paginated preview + PDF.
//!
//! Usage:
//!   pagepress <resume.md> [output.pdf] [--css FILE] [--styles FILE.json]
//!             [--paper a4|letter|legal] [--font FILE.ttf] [--pages]
//!             [--print-html FILE] [--title TEXT]
//!
//! If `output.pdf` is omitted the PDF is written next to the input file with
//! the same stem (e.g. `resume.md` → `resume.pdf`).

use std::{env, fs, path::PathBuf, process};

use pagepress::cancel::CancelToken;
use pagepress::fonts::FontManager;
use pagepress::markdown::markdown_to_html;
use pagepress::measure::TaffyMeasurer;
use pagepress::pagination::Pager;
use pagepress::pipeline::{PdfPipeline, PdfRequest, PipelineConfig};
use pagepress::scope::{render_print_document_for_pages, ScopedStyleContext, StyleRegistry};
use pagepress::style_config::{PaperSize, StyleConfig};

#[derive(Default)]
struct Args {
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    css: Option<PathBuf>,
    styles: Option<PathBuf>,
    paper: Option<PaperSize>,
    font: Option<PathBuf>,
    print_html: Option<PathBuf>,
    title: Option<String>,
    pages_json: bool,
}

fn main() {
    env_logger::init();

    let argv: Vec<String> = env::args().collect();
    let args = parse_args(&argv);

    let input = match &args.input {
        Some(p) => p.clone(),
        None => {
            eprintln!("Error: no input file specified.");
            print_usage(&argv[0]);
            process::exit(1);
        }
    };

    // Default output: same directory + same stem as input, but with .pdf
    let output = args.output.clone().unwrap_or_else(|| {
        let mut o = input.clone();
        o.set_extension("pdf");
        o
    });

    let markdown = read_or_exit(&input);
    let css = args.css.as_ref().map(read_or_exit).unwrap_or_default();
    let mut styles = match &args.styles {
        Some(path) => match StyleConfig::from_json(&read_or_exit(path)) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("Error parsing '{}': {e}", path.display());
                process::exit(1);
            }
        },
        None => StyleConfig::default(),
    };
    if let Some(paper) = args.paper {
        styles.paper_size = paper;
    }

    let mut fonts = FontManager::new();
    if let Some(path) = &args.font {
        let bytes = match fs::read(path) {
            Ok(b) => b,
            Err(e) => {
                eprintln!("Error reading '{}': {e}", path.display());
                process::exit(1);
            }
        };
        if let Err(e) = fonts.load_font(&styles.font_family, false, false, bytes) {
            eprintln!("Error loading font '{}': {e}", path.display());
            process::exit(1);
        }
    }

    // Preview pagination
    let html = markdown_to_html(&markdown);
    let ctx = ScopedStyleContext::create(&styles, &css);
    let registry = StyleRegistry::new();
    registry.inject(&ctx);
    let pager = Pager::new(TaffyMeasurer::new(fonts.clone()), registry.clone());
    let pages = pager.paginate(&html, &ctx);
    registry.dispose(&ctx);

    if args.pages_json {
        match serde_json::to_string_pretty(&pages) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error serialising pages: {e}");
                process::exit(1);
            }
        }
    } else {
        for page in &pages {
            eprintln!(
                "page {}: {:.0}/{:.0}px",
                page.page_number, page.content_height, page.available_height
            );
        }
    }

    if let Some(path) = &args.print_html {
        write_or_exit(path, render_print_document_for_pages(&ctx, &pages).as_bytes());
    }

    // PDF
    let default_title = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Resume")
        .to_string();
    let config = PipelineConfig {
        title: args.title.clone().unwrap_or(default_title),
        ..PipelineConfig::default()
    };
    let pipeline = PdfPipeline::with_fonts(fonts, config);
    let request = PdfRequest::new(markdown, css, styles);
    let artifact = match pipeline.generate(&request, &CancelToken::new(), &mut |p| {
        log::debug!("{:?} {}%", p.stage, p.percent)
    }) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Error generating PDF: {e}");
            process::exit(1);
        }
    };
    let bytes = match artifact.pdf_bytes() {
        Ok(b) => b,
        Err(e) => {
            eprintln!("Error decoding PDF: {e}");
            process::exit(1);
        }
    };

    // Create output directory if necessary.
    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            if let Err(e) = fs::create_dir_all(parent) {
                eprintln!("Error creating output directory: {e}");
                process::exit(1);
            }
        }
    }
    write_or_exit(&output, &bytes);
    eprintln!(
        "Wrote '{}' ({} bytes, {} page{})",
        output.display(),
        bytes.len(),
        artifact.page_count,
        if artifact.page_count == 1 { "" } else { "s" }
    );
}

fn parse_args(argv: &[String]) -> Args {
    let mut args = Args::default();
    let mut positional = 0usize;
    let mut iter = argv.iter().skip(1);

    let value = |flag: &str, next: Option<&String>| -> String {
        match next {
            Some(v) => v.clone(),
            None => {
                eprintln!("Missing value for {flag}");
                print_usage(&argv[0]);
                process::exit(1);
            }
        }
    };

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--css" => args.css = Some(PathBuf::from(value(arg, iter.next()))),
            "--styles" => args.styles = Some(PathBuf::from(value(arg, iter.next()))),
            "--font" => args.font = Some(PathBuf::from(value(arg, iter.next()))),
            "--print-html" => args.print_html = Some(PathBuf::from(value(arg, iter.next()))),
            "--title" | "-t" => args.title = Some(value(arg, iter.next())),
            "--paper" => {
                let name = value(arg, iter.next());
                match PaperSize::parse(&name) {
                    Some(p) => args.paper = Some(p),
                    None => {
                        eprintln!("Unknown paper size: {name}");
                        process::exit(1);
                    }
                }
            }
            "--pages" => args.pages_json = true,
            "--help" | "-h" => {
                print_usage(&argv[0]);
                process::exit(0);
            }
            other if other.starts_with('-') => {
                eprintln!("Unknown flag: {other}");
                print_usage(&argv[0]);
                process::exit(1);
            }
            path => {
                match positional {
                    0 => args.input = Some(PathBuf::from(path)),
                    1 => args.output = Some(PathBuf::from(path)),
                    _ => {
                        eprintln!("Unexpected argument: {path}");
                        print_usage(&argv[0]);
                        process::exit(1);
                    }
                }
                positional += 1;
            }
        }
    }
    args
}

fn read_or_exit(path: &PathBuf) -> String {
    match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error reading '{}': {e}", path.display());
            process::exit(1);
        }
    }
}

fn write_or_exit(path: &PathBuf, bytes: &[u8]) {
    if let Err(e) = fs::write(path, bytes) {
        eprintln!("Error writing '{}': {e}", path.display());
        process::exit(1);
    }
}

fn print_usage(prog: &str) {
    eprintln!("pagepress – Markdown resume to paginated PDF");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  {prog} <resume.md> [output.pdf] [flags]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  <resume.md>         Markdown source (raw HTML and <break/> markers allowed)");
    eprintln!("  [output.pdf]        Output path  (default: same stem as input with .pdf)");
    eprintln!();
    eprintln!("Flags:");
    eprintln!("  --css FILE          Custom stylesheet, scoped to the document");
    eprintln!("  --styles FILE.json  Style configuration (paperSize, marginH, marginV, ...)");
    eprintln!("  --paper NAME        a4, letter or legal (overrides --styles)");
    eprintln!("  --font FILE.ttf     Font used for measurement and drawing");
    eprintln!("  --pages             Print page records as JSON on stdout");
    eprintln!("  --print-html FILE   Write the paginated print document");
    eprintln!("  --title, -t TEXT    Document title in PDF metadata (default: input filename stem)");
    eprintln!("  --help              Print this message");
}
