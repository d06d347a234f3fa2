//==================================================
// File: bin/solvra_inspect.rs
//==================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Segment inspection tool
// Objective: Load a module from the search paths and print the virtual table of every
//            nominal type it declares
//==================================================

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use serde::Serialize;
use solvra_runtime::logging::init_tracing;
use solvra_runtime::segment::{DescriptorKind, DescriptorRef, DirectoryLoader};
use solvra_runtime::vtable::{ImplTable, VirtualMember, VirtualMethod};
use solvra_runtime::{RuntimeConfig, SegmentManager};

#[derive(Debug, Parser)]
#[command(name = "solvra_inspect", about = "Print the virtual tables of a Solvra segment")]
struct Cli {
    /// Module to load; defaults to `main_module` from the configuration.
    module: Option<String>,
    /// Extra directories searched before the configured ones.
    #[arg(short = 'L', long = "search-path")]
    search_paths: Vec<PathBuf>,
    /// Configuration file; defaults to the user config directory.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Emit JSON instead of text.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct TableReport {
    name: String,
    descriptor: DescriptorRef,
    parent: Option<DescriptorRef>,
    layout_total: u32,
    members: Vec<VirtualMember>,
    methods: Vec<VirtualMethod>,
    impls: Vec<ImplReport>,
    has_allocator: bool,
}

#[derive(Debug, Serialize)]
struct ImplReport {
    concept: DescriptorRef,
    extensions: Vec<(DescriptorRef, VirtualMethod)>,
}

impl From<&ImplTable> for ImplReport {
    fn from(table: &ImplTable) -> Self {
        let mut extensions: Vec<_> = table
            .methods
            .iter()
            .map(|(action, method)| (*action, *method))
            .collect();
        extensions.sort_by_key(|(action, _)| (action.segment, action.index));
        Self {
            concept: table.concept,
            extensions,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => RuntimeConfig::load(path)?,
        None => RuntimeConfig::load_or_default()?,
    };
    init_tracing(&config.log_filter);

    let module = cli
        .module
        .clone()
        .or_else(|| config.main_module.clone())
        .ok_or_else(|| anyhow!("no module given and no main_module configured"))?;
    let mut search_paths = cli.search_paths.clone();
    search_paths.extend(config.search_paths.iter().cloned());

    let mut manager = SegmentManager::new(Arc::new(DirectoryLoader::new(search_paths)));
    let segment = manager
        .get_or_load_segment(&module)
        .with_context(|| format!("loading module `{module}`"))?;
    let reports = collect_reports(&mut manager, segment)?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            print_report(report);
        }
    }
    Ok(())
}

fn collect_reports(manager: &mut SegmentManager, segment: u32) -> Result<Vec<TableReport>> {
    let loaded = manager.segment(segment)?;
    let object = loaded.object();
    let sections = [
        (DescriptorKind::Class, object.classes.as_slice()),
        (DescriptorKind::Enum, object.enums.as_slice()),
        (DescriptorKind::Instance, object.instances.as_slice()),
        (DescriptorKind::Struct, object.structs.as_slice()),
    ];

    let mut reports = Vec::new();
    for (kind, descriptors) in sections {
        for (index, nominal) in descriptors.iter().enumerate() {
            let descriptor = DescriptorRef::new(kind, segment, index as u32);
            let id = manager
                .virtual_table(descriptor)
                .with_context(|| format!("building table of `{}`", nominal.name))?;
            let view = manager.vtable(id);
            let mut methods: Vec<VirtualMethod> =
                view.table().methods.values().copied().collect();
            methods.sort_by_key(|method| (method.call.segment, method.call.index));
            let mut impls: Vec<ImplReport> =
                view.table().impls.values().map(ImplReport::from).collect();
            impls.sort_by_key(|table| (table.concept.segment, table.concept.index));
            reports.push(TableReport {
                name: nominal.name.clone(),
                descriptor,
                parent: view.parent().map(|parent| parent.table().descriptor),
                layout_total: view.layout_total(),
                members: view.flattened_members(),
                methods,
                impls,
                has_allocator: view.table().allocator.is_some(),
            });
        }
    }
    Ok(reports)
}

fn print_report(report: &TableReport) {
    match report.parent {
        Some(parent) => println!("{} ({}) extends {}", report.name, report.descriptor, parent),
        None => println!("{} ({})", report.name, report.descriptor),
    }
    println!(
        "  layout: {} slots{}",
        report.layout_total,
        if report.has_allocator { ", native allocator" } else { "" }
    );
    for member in &report.members {
        println!("  member {:>3}: {}", member.offset, member.field);
    }
    for method in &report.methods {
        println!("  method {} @ {:#06x}", method.call, method.proc_offset);
    }
    for table in &report.impls {
        println!("  impl {} ({} extensions)", table.concept, table.extensions.len());
    }
}

//==================================================
// End of file
//==================================================
