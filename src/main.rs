// maf2daa: Convert MAF alignments into the binary DAA archive format.
//
// Copyright 2026 maf2daa contributors.
//
// Copyrights in this project are retained by contributors. No copyright assignment
// is required to contribute to this project.
//
// Except as otherwise noted (below and/or in individual files), this
// project is licensed under the Apache License, Version 2.0
// <LICENSE-APACHE> or <http://www.apache.org/licenses/LICENSE-2.0> or
// the MIT license, <LICENSE-MIT> or <http://opensource.org/licenses/MIT>,
// at your option.
//
use std::io::BufWriter;
use std::io::Write;
use std::path::Path;
use std::process::ExitCode;

use bstr::ByteSlice;
use clap::CommandFactory;
use clap::Parser;

use maf2daa::cli;
use maf2daa::daa::reader::DaaReader;
use maf2daa::edits::expand_alignment;

type E = Box<dyn std::error::Error + Send + Sync>;

/// Initializes the logger with verbosity given in `log_max_level`.
fn init_log(log_max_level: usize) {
    stderrlog::new()
    .module(module_path!())
    .quiet(false)
    .verbosity(log_max_level)
    .timestamp(stderrlog::Timestamp::Off)
    .init()
    .unwrap();
}

fn default_procs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn view(input_file: &Path, alignments: bool) -> Result<(), E> {
    let mut reader = DaaReader::open(input_file)?;
    let header = reader.header.clone();

    let mut conn_out = BufWriter::new(std::io::stdout());
    writeln!(conn_out, "queries: {}", header.query_records)?;
    writeln!(
        conn_out,
        "subjects: {} used of {} in database",
        header.db_seqs_used, header.db_seqs
    )?;
    writeln!(conn_out, "database letters: {}", header.db_letters)?;
    writeln!(conn_out, "gap open: {}", header.gap_open)?;
    writeln!(conn_out, "gap extend: {}", header.gap_extend)?;
    writeln!(conn_out, "lambda: {}", header.lambda)?;
    writeln!(conn_out, "K: {}", header.k)?;

    if alignments {
        for i in 0..reader.record_offsets.len() {
            let record = reader.read_query_record(i)?;
            for hit in record.hits(&header)? {
                let subject = reader.reference_name(hit.subject_id as usize)?;
                let (query_row, subject_row) =
                    expand_alignment(&hit.edit_ops, &record.aligned_query_dna(&hit));
                writeln!(
                    conn_out,
                    "{}\t{}\tscore={}\tbits={}\tframe={}\tquery={}..+{}\tsubject={}..+{}",
                    record.name.as_bstr(),
                    subject.as_bstr(),
                    hit.raw_score,
                    hit.bit_score,
                    hit.frame,
                    hit.query_start,
                    hit.query_length,
                    hit.ref_start,
                    hit.ref_length,
                )?;
                writeln!(conn_out, "  query:   {}", query_row.as_bstr())?;
                writeln!(conn_out, "  subject: {}", subject_row.as_bstr())?;
            }
        }
    }
    conn_out.flush()?;
    Ok(())
}

fn run() -> Result<(), E> {
    let cli = cli::Cli::parse();

    // Subcommands:
    match &cli.command {
        // Convert
        Some(cli::Commands::Convert {
            maf_file,
            reads_file,
            out_file,
            procs,
            top,
            no_filter,
            verbose,
        }) => {
            init_log(if *verbose { 2 } else { 1 });
            let procs = procs.unwrap_or_else(default_procs);
            maf2daa::convert::run(maf_file, reads_file, out_file, procs, *top, !*no_filter)?;
        }

        // Merge
        Some(cli::Commands::Merge {
            daa_dir,
            reads_file,
            out_file,
            procs,
            verbose,
        }) => {
            init_log(if *verbose { 2 } else { 1 });
            let procs = procs.unwrap_or_else(default_procs);
            maf2daa::merge::run(daa_dir, reads_file, out_file, procs)?;
        }

        // View
        Some(cli::Commands::View {
            input_file,
            alignments,
            verbose,
        }) => {
            init_log(if *verbose { 2 } else { 1 });
            view(input_file, *alignments)?;
        }

        None => {
            cli::Cli::command().print_help()?;
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
