//! CLI Tool Example
//!
//! This example demonstrates how to build a command-line tool
//! using xlsxsight for converting workbooks to Markdown, HTML or JSON.

use std::fs::File;
use std::io::{self, Write};
use std::process;
use xlsxsight::{
    ConnectorEndpoints, ConverterBuilder, OutputFormat, OutputMode, SheetSelector, XlsxToMdError,
};

/// Minimal stderr logger so that parser warnings are visible with `--verbose`
struct StderrLogger;

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

struct Options {
    sheet_selector: SheetSelector,
    output_format: OutputFormat,
    output_mode: OutputMode,
    include_hidden: bool,
    strict: bool,
    threshold: Option<f64>,
    endpoints: ConnectorEndpoints,
}

fn usage(program: &str) -> ! {
    eprintln!("Usage: {} <input.xlsx> <output> [options]", program);
    eprintln!("\nOptions:");
    eprintln!("  --sheet-index <n>       Select sheet by index (0-based)");
    eprintln!("  --sheet-name <name>     Select sheet by name");
    eprintln!("  --full                  Markdown with the complete document model");
    eprintln!("  --sheetview             Markdown with embedded sheet grids");
    eprintln!("  --html                  Single HTML document");
    eprintln!("  --json                  Document model as JSON");
    eprintln!("  --skip-hidden           Exclude hidden sheets");
    eprintln!("  --strict-unsupported    Fail when unsupported elements are found");
    eprintln!("  --threshold <px>        Connector snapping distance (default 220)");
    eprintln!("  --flip-aware            Swap connector endpoints on flipH/flipV");
    eprintln!("  --verbose               Print parser warnings to stderr");
    eprintln!("  --stdout                Write output to stdout instead of file");
    eprintln!("\nExamples:");
    eprintln!("  {} input.xlsx output.md", program);
    eprintln!("  {} input.xlsx output.html --html", program);
    eprintln!("  {} input.xlsx - --json --stdout", program);
    process::exit(1);
}

fn value_of<'a>(args: &'a [String], i: usize, flag: &str) -> &'a str {
    match args.get(i + 1) {
        Some(v) => v,
        None => {
            eprintln!("Error: {} requires a value", flag);
            process::exit(1);
        }
    }
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        usage(&args[0]);
    }

    let input_path = &args[1];
    let output_path = &args[2];
    let use_stdout = output_path == "-" || args.iter().any(|a| a == "--stdout");

    let mut options = Options {
        sheet_selector: SheetSelector::All,
        output_format: OutputFormat::Markdown,
        output_mode: OutputMode::Work,
        include_hidden: true,
        strict: false,
        threshold: None,
        endpoints: ConnectorEndpoints::Anchor,
    };
    let mut verbose = false;

    let mut i = 3;
    while i < args.len() {
        match args[i].as_str() {
            "--sheet-index" => {
                let raw = value_of(&args, i, "--sheet-index");
                let index = raw.parse::<usize>().unwrap_or_else(|_| {
                    eprintln!("Error: Invalid sheet index: {}", raw);
                    process::exit(1);
                });
                options.sheet_selector = SheetSelector::Index(index);
                i += 1;
            }
            "--sheet-name" => {
                options.sheet_selector =
                    SheetSelector::Name(value_of(&args, i, "--sheet-name").to_string());
                i += 1;
            }
            "--threshold" => {
                let raw = value_of(&args, i, "--threshold");
                options.threshold = Some(raw.parse::<f64>().unwrap_or_else(|_| {
                    eprintln!("Error: Invalid threshold: {}", raw);
                    process::exit(1);
                }));
                i += 1;
            }
            "--full" => options.output_mode = OutputMode::Full,
            "--sheetview" => options.output_mode = OutputMode::SheetView,
            "--html" => options.output_format = OutputFormat::Html,
            "--json" => options.output_format = OutputFormat::Json,
            "--skip-hidden" => options.include_hidden = false,
            "--strict-unsupported" => options.strict = true,
            "--flip-aware" => options.endpoints = ConnectorEndpoints::FlipAware,
            "--verbose" => verbose = true,
            "--stdout" => {}
            other => {
                eprintln!("Error: Unknown option: {}", other);
                process::exit(1);
            }
        }
        i += 1;
    }

    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(if verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Error
        });
    }

    match convert(input_path, output_path, options, use_stdout) {
        Ok(()) => {
            if !use_stdout {
                println!("Conversion completed: {} -> {}", input_path, output_path);
            }
        }
        Err(e) => {
            handle_error(e);
            process::exit(1);
        }
    }
}

fn convert(
    input_path: &str,
    output_path: &str,
    options: Options,
    use_stdout: bool,
) -> Result<(), XlsxToMdError> {
    let mut builder = ConverterBuilder::new()
        .with_sheet_selector(options.sheet_selector)
        .with_output_format(options.output_format)
        .with_output_mode(options.output_mode)
        .include_hidden_sheets(options.include_hidden)
        .strict_unsupported(options.strict)
        .with_connector_endpoints(options.endpoints);
    if let Some(threshold) = options.threshold {
        builder = builder.with_connector_threshold(threshold);
    }
    let converter = builder.build()?;

    if use_stdout {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        converter.convert_path(input_path, &mut handle)?;
        handle.flush()?;
    } else {
        let output = File::create(output_path)?;
        converter.convert_path(input_path, output)?;
    }

    Ok(())
}

fn handle_error(error: XlsxToMdError) {
    match error {
        XlsxToMdError::Io(io_err) => {
            eprintln!("I/O Error: {}", io_err);
            eprintln!("Please check that the file exists and you have permission to access it.");
        }
        XlsxToMdError::UnsupportedFormat(what) => {
            eprintln!("Unsupported Format: {}", what);
            eprintln!("Only .xlsx packages can be converted.");
        }
        XlsxToMdError::MissingPart(part) => {
            eprintln!("Missing Part: {}", part);
            eprintln!("The package does not contain a workbook.");
        }
        XlsxToMdError::StrictUnsupportedElements { count } => {
            eprintln!("Strict mode: {} unsupported element(s) found.", count);
            eprintln!("Run without --strict-unsupported to see them in the output.");
        }
        XlsxToMdError::Config(msg) => {
            eprintln!("Configuration Error: {}", msg);
        }
        XlsxToMdError::SecurityViolation(msg) => {
            eprintln!("Security Violation: {}", msg);
        }
        other => {
            eprintln!("Error: {}", other);
        }
    }
}
