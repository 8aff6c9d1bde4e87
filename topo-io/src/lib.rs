use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use topo_core::{
    geometry::{Point2, Point3, Vector2},
    primitive::{
        Arc, BlockDefinition, Circle, Drawing, Ellipse, Insert, Line, PointEntity, Polyline,
        PolylineVertex, Primitive, Spline,
    },
};
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum IoError {
    #[error("failed to read file {path:?}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed JSON: {0}")]
    Syntax(#[from] serde_json::Error),
    #[error("invalid document structure: {0}")]
    InvalidDocument(String),
}

/// 单条记录解码失败的说明。`location` 形如 `primitives[3]` 或 `blocks.TILE[0]`。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordDiagnostic {
    pub location: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct LoadedDrawing {
    pub drawing: Drawing,
    pub diagnostics: Vec<RecordDiagnostic>,
}

pub trait DrawingLoader {
    fn load(&self, path: &Path) -> Result<LoadedDrawing, IoError>;
}

/// JSON 交换格式读取器。
///
/// 文档可以是 `{ "primitives": [...], "blocks": { "NAME": [...] }, "angle_unit": "degrees" }`，
/// 也可以直接是图元数组。每条记录以 `"type"` 区分类型；解码失败的记录被跳过并记录诊断。
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonFacade;

impl JsonFacade {
    pub fn new() -> Self {
        Self
    }

    pub fn parse_str(&self, source: &str) -> Result<LoadedDrawing, IoError> {
        let value: Value = serde_json::from_str(source)?;
        self.parse_value(value)
    }

    pub fn parse_value(&self, value: Value) -> Result<LoadedDrawing, IoError> {
        let (records, blocks, angles) = match value {
            Value::Array(records) => (records, None, AngleUnit::Radians),
            Value::Object(mut object) => {
                let angles = match object.remove("angle_unit") {
                    None => AngleUnit::Radians,
                    Some(unit) => serde_json::from_value(unit).map_err(|err| {
                        IoError::InvalidDocument(format!("angle_unit 取值无效：{err}"))
                    })?,
                };
                let records = match object.remove("primitives") {
                    Some(Value::Array(records)) => records,
                    Some(_) => {
                        return Err(IoError::InvalidDocument(
                            "`primitives` 必须是数组".to_string(),
                        ));
                    }
                    None => {
                        return Err(IoError::InvalidDocument(
                            "文档缺少 `primitives` 数组".to_string(),
                        ));
                    }
                };
                (records, object.remove("blocks"), angles)
            }
            other => {
                return Err(IoError::InvalidDocument(format!(
                    "文档必须是对象或数组，实际为 {}",
                    value_kind(&other)
                )));
            }
        };

        let mut drawing = Drawing::new();
        let mut diagnostics = Vec::new();

        if let Some(blocks) = blocks {
            let Value::Object(blocks) = blocks else {
                return Err(IoError::InvalidDocument(
                    "`blocks` 必须是以块名为键的对象".to_string(),
                ));
            };
            for (name, records) in blocks {
                let Value::Array(records) = records else {
                    return Err(IoError::InvalidDocument(format!(
                        "块 `{name}` 的内容必须是图元数组"
                    )));
                };
                let prefix = format!("blocks.{name}");
                let primitives = decode_records(records, &prefix, angles, &mut diagnostics);
                drawing.add_block_definition(BlockDefinition { name, primitives });
            }
        }

        for primitive in decode_records(records, "primitives", angles, &mut diagnostics) {
            drawing.add_primitive(primitive);
        }

        debug!(
            primitives = drawing.len(),
            blocks = drawing.blocks().count(),
            skipped = diagnostics.len(),
            "JSON 图纸读取完成"
        );
        Ok(LoadedDrawing {
            drawing,
            diagnostics,
        })
    }
}

impl DrawingLoader for JsonFacade {
    fn load(&self, path: &Path) -> Result<LoadedDrawing, IoError> {
        let data = fs::read_to_string(path).map_err(|source| IoError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        self.parse_str(&data)
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "布尔值",
        Value::Number(_) => "数字",
        Value::String(_) => "字符串",
        Value::Array(_) => "数组",
        Value::Object(_) => "对象",
    }
}

fn decode_records(
    records: Vec<Value>,
    prefix: &str,
    angles: AngleUnit,
    diagnostics: &mut Vec<RecordDiagnostic>,
) -> Vec<Primitive> {
    let mut primitives = Vec::with_capacity(records.len());
    for (index, record) in records.into_iter().enumerate() {
        let decoded = serde_json::from_value::<RawPrimitive>(record)
            .map_err(|err| err.to_string())
            .and_then(|raw| raw.into_primitive(angles));
        match decoded {
            Ok(primitive) => primitives.push(primitive),
            Err(message) => {
                let location = format!("{prefix}[{index}]");
                warn!(%location, %message, "跳过无法解码的图元记录");
                diagnostics.push(RecordDiagnostic { location, message });
            }
        }
    }
    primitives
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
enum AngleUnit {
    Radians,
    Degrees,
}

impl AngleUnit {
    fn to_radians(self, value: f64) -> f64 {
        match self {
            AngleUnit::Radians => value,
            AngleUnit::Degrees => value.to_radians(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawPoint {
    Array(Vec<f64>),
    Object {
        x: f64,
        y: f64,
        #[serde(default)]
        z: f64,
    },
}

impl RawPoint {
    fn into_point3(self) -> Result<Point3, String> {
        match self {
            RawPoint::Array(values) => match values.as_slice() {
                [x, y] => Ok(Point3::new(*x, *y, 0.0)),
                [x, y, z] => Ok(Point3::new(*x, *y, *z)),
                other => Err(format!("坐标需要 2 或 3 个分量，实际 {} 个", other.len())),
            },
            RawPoint::Object { x, y, z } => Ok(Point3::new(x, y, z)),
        }
    }

    fn into_point2(self) -> Result<Point2, String> {
        self.into_point3().map(Point3::xy)
    }
}

fn points2(raw: Vec<RawPoint>) -> Result<Vec<Point2>, String> {
    raw.into_iter().map(RawPoint::into_point2).collect()
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawVertex {
    Array(Vec<f64>),
    Object {
        x: f64,
        y: f64,
        #[serde(default)]
        bulge: f64,
    },
}

impl RawVertex {
    fn into_vertex(self) -> Result<PolylineVertex, String> {
        match self {
            RawVertex::Array(values) => match values.as_slice() {
                [x, y] => Ok(PolylineVertex::new(Point2::new(*x, *y))),
                [x, y, bulge] => Ok(PolylineVertex::with_bulge(Point2::new(*x, *y), *bulge)),
                other => Err(format!(
                    "多段线顶点需要 [x, y] 或 [x, y, bulge]，实际 {} 个分量",
                    other.len()
                )),
            },
            RawVertex::Object { x, y, bulge } => {
                Ok(PolylineVertex::with_bulge(Point2::new(x, y), bulge))
            }
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RawPrimitive {
    Line {
        start: RawPoint,
        end: RawPoint,
    },
    Arc {
        center: RawPoint,
        radius: f64,
        start_angle: f64,
        end_angle: f64,
    },
    Circle {
        center: RawPoint,
        radius: f64,
    },
    Ellipse {
        center: RawPoint,
        major_axis: RawPoint,
        ratio: f64,
        #[serde(default)]
        start_parameter: f64,
        #[serde(default)]
        end_parameter: f64,
    },
    Spline {
        degree: usize,
        #[serde(default)]
        control_points: Vec<RawPoint>,
        #[serde(default)]
        knots: Vec<f64>,
        #[serde(default)]
        weights: Vec<f64>,
        #[serde(default)]
        fit_points: Vec<RawPoint>,
        #[serde(default)]
        closed: bool,
    },
    #[serde(alias = "lwpolyline")]
    Polyline {
        vertices: Vec<RawVertex>,
        #[serde(default)]
        closed: bool,
    },
    Point {
        position: RawPoint,
    },
    Insert {
        block: String,
        position: RawPoint,
    },
}

impl RawPrimitive {
    fn into_primitive(self, angles: AngleUnit) -> Result<Primitive, String> {
        let primitive = match self {
            RawPrimitive::Line { start, end } => Primitive::Line(Line {
                start: start.into_point3()?,
                end: end.into_point3()?,
            }),
            RawPrimitive::Arc {
                center,
                radius,
                start_angle,
                end_angle,
            } => Primitive::Arc(Arc {
                center: center.into_point2()?,
                radius,
                start_angle: angles.to_radians(start_angle),
                end_angle: angles.to_radians(end_angle),
            }),
            RawPrimitive::Circle { center, radius } => Primitive::Circle(Circle {
                center: center.into_point2()?,
                radius,
            }),
            RawPrimitive::Ellipse {
                center,
                major_axis,
                ratio,
                start_parameter,
                end_parameter,
            } => {
                let axis = major_axis.into_point2()?;
                Primitive::Ellipse(Ellipse {
                    center: center.into_point2()?,
                    major_axis: Vector2::new(axis.x(), axis.y()),
                    ratio,
                    start_parameter,
                    end_parameter,
                })
            }
            RawPrimitive::Spline {
                degree,
                control_points,
                knots,
                weights,
                fit_points,
                closed,
            } => Primitive::Spline(Spline {
                degree,
                control_points: points2(control_points)?,
                knots,
                weights,
                fit_points: points2(fit_points)?,
                is_closed: closed,
            }),
            RawPrimitive::Polyline { vertices, closed } => Primitive::Polyline(Polyline {
                vertices: vertices
                    .into_iter()
                    .map(RawVertex::into_vertex)
                    .collect::<Result<_, _>>()?,
                is_closed: closed,
            }),
            RawPrimitive::Point { position } => Primitive::Point(PointEntity {
                position: position.into_point3()?,
            }),
            RawPrimitive::Insert { block, position } => Primitive::Insert(Insert {
                block_name: block,
                insert: position.into_point2()?,
            }),
        };
        Ok(primitive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn points_accept_arrays_and_objects() {
        let array: RawPoint = serde_json::from_str("[1.0, 2.0]").expect("数组坐标");
        assert_eq!(array.into_point2(), Ok(Point2::new(1.0, 2.0)));

        let object: RawPoint = serde_json::from_str(r#"{"x": 1, "y": 2, "z": 3}"#).expect("对象坐标");
        assert_eq!(object.into_point3(), Ok(Point3::new(1.0, 2.0, 3.0)));

        let short: RawPoint = serde_json::from_str("[1.0]").expect("单分量");
        assert!(short.into_point2().is_err());
    }

    #[test]
    fn degrees_are_converted_for_arcs() {
        let raw: RawPrimitive = serde_json::from_str(
            r#"{"type": "arc", "center": [0, 0], "radius": 1, "start_angle": 0, "end_angle": 90}"#,
        )
        .expect("圆弧记录");
        let Ok(Primitive::Arc(arc)) = raw.into_primitive(AngleUnit::Degrees) else {
            panic!("应当得到圆弧");
        };
        assert!((arc.end_angle - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn lwpolyline_alias_is_accepted() {
        let raw: RawPrimitive = serde_json::from_str(
            r#"{"type": "lwpolyline", "vertices": [[0, 0, 0.5], {"x": 4, "y": 0}], "closed": false}"#,
        )
        .expect("多段线记录");
        let Ok(Primitive::Polyline(polyline)) = raw.into_primitive(AngleUnit::Radians) else {
            panic!("应当得到多段线");
        };
        assert_eq!(polyline.vertices.len(), 2);
        assert!((polyline.vertices[0].bulge - 0.5).abs() < 1e-12);
        assert_eq!(polyline.vertices[1].bulge, 0.0);
    }
}
