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
use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(version)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    // Convert a MAF file into a .daa archive
    Convert {
        // Input MAF file; must be uncompressed, the shard scanner seeks
        #[arg(short = 'i', long = "input", required = true, help = "Input MAF file (uncompressed)")]
        maf_file: PathBuf,

        // FastX file the alignments were computed from
        #[arg(short = 'r', long = "reads", required = true, help = "Query .fasta/.fastq file")]
        reads_file: PathBuf,

        // Output file path
        #[arg(short = 'o', long = "output", required = true)]
        out_file: PathBuf,

        // Worker threads, defaults to the available cores
        #[arg(short = 'p', long = "procs")]
        procs: Option<usize>,

        // Keep hits scoring within this percentage of the best overlapping hit
        #[arg(long = "top", default_value_t = 10.0)]
        top: f64,

        // Skip the domination filter
        #[arg(long = "no-filter", default_value_t = false)]
        no_filter: bool,

        // Verbosity
        #[arg(long = "verbose", default_value_t = false)]
        verbose: bool,
    },

    // Merge the .daa archives in a directory
    Merge {
        // Directory containing the input archives
        #[arg(short = 'f', long = "files", required = true, help = "Directory with .daa inputs")]
        daa_dir: PathBuf,

        // FastX file the alignments were computed from
        #[arg(short = 'r', long = "reads", required = true, help = "Query .fasta/.fastq file")]
        reads_file: PathBuf,

        // Output file path
        #[arg(short = 'o', long = "output", required = true)]
        out_file: PathBuf,

        // Worker threads, defaults to the available cores
        #[arg(short = 'p', long = "procs")]
        procs: Option<usize>,

        // Verbosity
        #[arg(long = "verbose", default_value_t = false)]
        verbose: bool,
    },

    // Print the contents of a .daa archive
    View {
        // Input file
        #[arg(group = "input", required = true, help = "Input .daa archive")]
        input_file: PathBuf,

        // Decode and print the alignments too
        #[arg(short = 'a', long = "alignments", default_value_t = false)]
        alignments: bool,

        // Verbosity
        #[arg(long = "verbose", default_value_t = false)]
        verbose: bool,
    },
}
