use std::path::{Path, PathBuf};

use topo_core::primitive::Drawing;
use topo_engine::engine::demo_drawing;
use topo_engine::errors::Diagnostic;
use topo_engine::strategy::Divergence;
use topo_engine::{AreaReport, ExtrusionOutput};
use topo_io::{DrawingLoader, IoError, JsonFacade, RecordDiagnostic};
use tracing::info;

/// 图纸来源，便于输出加载信息。
#[derive(Debug, Clone)]
pub enum DrawingSource {
    Json(PathBuf),
    Demo,
}

#[derive(Debug)]
pub struct LoadedInput {
    pub drawing: Drawing,
    pub source: DrawingSource,
    pub records_skipped: Vec<RecordDiagnostic>,
}

/// 读取指定的 JSON 图纸；未指定路径时使用内置示例。
pub fn load_drawing(path: Option<&Path>) -> Result<LoadedInput, IoError> {
    let Some(path) = path else {
        info!("未指定输入文件，使用内置示例图纸");
        return Ok(LoadedInput {
            drawing: demo_drawing(),
            source: DrawingSource::Demo,
            records_skipped: Vec::new(),
        });
    };
    let loaded = JsonFacade::new().load(path)?;
    info!(
        path = %path.display(),
        primitives = loaded.drawing.len(),
        "从 JSON 加载图纸成功"
    );
    Ok(LoadedInput {
        drawing: loaded.drawing,
        source: DrawingSource::Json(path.to_path_buf()),
        records_skipped: loaded.diagnostics,
    })
}

fn print_header(input: &LoadedInput) {
    match &input.source {
        DrawingSource::Json(path) => println!("图纸：{}", path.display()),
        DrawingSource::Demo => println!("图纸：内置示例"),
    }
    println!("图元数量：{}", input.drawing.len());
    if let Some(bounds) = input.drawing.bounds() {
        println!(
            "范围：({:.3}, {:.3}) - ({:.3}, {:.3})",
            bounds.min().x(),
            bounds.min().y(),
            bounds.max().x(),
            bounds.max().y()
        );
    }
    for record in &input.records_skipped {
        println!("  ! 记录 {} 无法解码：{}", record.location, record.message);
    }
}

fn print_diagnostics(diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        println!("  ! {diagnostic}");
    }
}

pub fn print_area(input: &LoadedInput, report: &AreaReport) {
    print_header(input);
    println!("总面积：{:.6}（来源：{}）", report.total_area, report.source);
    println!(
        "闭合图元 {}，开放线段 {}，退化线段 {}，未闭合线段 {}",
        report.closed_primitives,
        report.open_segments,
        report.degenerate_segments,
        report.unused_segments
    );
    for contour in &report.nesting.contours {
        let role = if contour.is_hole() { "孔" } else { "实体" };
        println!(
            "  - 深度 {} {}：面积 {:.6}，{} 个顶点",
            contour.depth,
            role,
            contour.area(),
            contour.points.len()
        );
    }
    print_diagnostics(&report.diagnostics);
}

pub fn print_extrusion(input: &LoadedInput, extrusion: &ExtrusionOutput) {
    print_header(input);
    println!("形状数量：{}", extrusion.shapes.len());
    for (index, shape) in extrusion.shapes.iter().enumerate() {
        println!(
            "  - 形状 #{index}：外轮廓面积 {:.6}，孔 {} 个",
            shape.outer.area(),
            shape.holes.len()
        );
    }
    for segment in &extrusion.open_segments {
        println!(
            "  ~ 开放线段 ({:.3}, {:.3}) -> ({:.3}, {:.3})",
            segment.start.x(),
            segment.start.y(),
            segment.end.x(),
            segment.end.y()
        );
    }
    print_diagnostics(&extrusion.diagnostics);
}

pub fn print_divergence(input: &LoadedInput, divergence: &Divergence) {
    print_header(input);
    println!(
        "面遍历：面积 {:.6}，轮廓 {}，未用线段 {}",
        divergence.graph_area, divergence.graph_contours, divergence.graph_unused
    );
    println!(
        "链式拼接：面积 {:.6}，轮廓 {}，未用线段 {}",
        divergence.chain_area, divergence.chain_contours, divergence.chain_unused
    );
    if divergence.diverges(1e-6) {
        println!("两种策略结果不一致");
    } else {
        println!("两种策略结果一致");
    }
}
