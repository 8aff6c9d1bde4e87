pub mod geometry {
    use glam::{DVec2, DVec3};
    use serde::{Deserialize, Serialize};

    /// 二维点，内部以 `glam::DVec2` 表示。点没有身份，只按距离比较。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point2(pub DVec2);

    impl Point2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_vec(vec: DVec2) -> Self {
            Self(vec)
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn translate(self, offset: Vector2) -> Self {
            Self(self.0 + offset.0)
        }

        #[inline]
        pub fn vector_to(self, other: Point2) -> Vector2 {
            Vector2(other.0 - self.0)
        }

        #[inline]
        pub fn distance(self, other: Point2) -> f64 {
            self.0.distance(other.0)
        }

        #[inline]
        pub fn distance_squared(self, other: Point2) -> f64 {
            self.0.distance_squared(other.0)
        }

        /// 判断两点是否落在给定容差内（严格小于）。
        #[inline]
        pub fn is_near(self, other: Point2, tolerance: f64) -> bool {
            self.distance(other) < tolerance
        }

        #[inline]
        pub fn lerp(self, other: Point2, t: f64) -> Point2 {
            Self(self.0.lerp(other.0, t))
        }

        #[inline]
        pub fn is_finite(self) -> bool {
            self.0.is_finite()
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }
    }

    impl From<DVec2> for Point2 {
        fn from(value: DVec2) -> Self {
            Self::from_vec(value)
        }
    }

    /// 二维向量。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Vector2(pub DVec2);

    impl Vector2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_points(start: Point2, end: Point2) -> Self {
            Self(end.0 - start.0)
        }

        #[inline]
        pub fn length(self) -> f64 {
            self.0.length()
        }

        #[inline]
        pub fn length_squared(self) -> f64 {
            self.0.length_squared()
        }

        /// 与 X 轴正方向的夹角，取值范围 (-π, π]。
        #[inline]
        pub fn angle(self) -> f64 {
            self.0.y.atan2(self.0.x)
        }

        #[inline]
        pub fn is_finite(self) -> bool {
            self.0.is_finite()
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }
    }

    impl From<DVec2> for Vector2 {
        fn from(value: DVec2) -> Self {
            Self(value)
        }
    }

    /// 三维点。解码器给出的直线端点与点实体带有标高，拓扑计算只使用 XY 投影。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point3(pub DVec3);

    impl Point3 {
        #[inline]
        pub fn new(x: f64, y: f64, z: f64) -> Self {
            Self(DVec3::new(x, y, z))
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn z(self) -> f64 {
            self.0.z
        }

        #[inline]
        pub fn xy(self) -> Point2 {
            Point2::new(self.0.x, self.0.y)
        }

        #[inline]
        pub fn translate_xy(self, offset: Vector2) -> Self {
            Self(DVec3::new(self.0.x + offset.x(), self.0.y + offset.y(), self.0.z))
        }

        #[inline]
        pub fn is_finite(self) -> bool {
            self.0.is_finite()
        }

        #[inline]
        pub fn as_vec3(self) -> DVec3 {
            self.0
        }
    }

    impl From<DVec3> for Point3 {
        fn from(value: DVec3) -> Self {
            Self(value)
        }
    }

    impl From<Point2> for Point3 {
        fn from(value: Point2) -> Self {
            Self::new(value.x(), value.y(), 0.0)
        }
    }

    /// 轴对齐边界框，用于估算图元/图纸范围。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Bounds2D {
        min: Point2,
        max: Point2,
    }

    impl Bounds2D {
        #[inline]
        pub fn new(min: Point2, max: Point2) -> Self {
            Self { min, max }
        }

        #[inline]
        pub fn empty() -> Self {
            Self {
                min: Point2::new(f64::INFINITY, f64::INFINITY),
                max: Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
            }
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.min.x() > self.max.x() || self.min.y() > self.max.y()
        }

        #[inline]
        pub fn min(&self) -> Point2 {
            self.min
        }

        #[inline]
        pub fn max(&self) -> Point2 {
            self.max
        }

        #[inline]
        pub fn width(&self) -> f64 {
            if self.is_empty() {
                0.0
            } else {
                self.max.x() - self.min.x()
            }
        }

        #[inline]
        pub fn height(&self) -> f64 {
            if self.is_empty() {
                0.0
            } else {
                self.max.y() - self.min.y()
            }
        }

        pub fn include_point(&mut self, point: Point2) {
            if self.is_empty() {
                self.min = point;
                self.max = point;
                return;
            }
            let min_vec = self.min.as_vec2().min(point.as_vec2());
            let max_vec = self.max.as_vec2().max(point.as_vec2());
            self.min = Point2::from_vec(min_vec);
            self.max = Point2::from_vec(max_vec);
        }

        pub fn include_bounds(&mut self, other: &Bounds2D) {
            if other.is_empty() {
                return;
            }
            self.include_point(other.min);
            self.include_point(other.max);
        }

        #[inline]
        pub fn contains(&self, point: Point2) -> bool {
            !self.is_empty()
                && point.x() >= self.min.x()
                && point.x() <= self.max.x()
                && point.y() >= self.min.y()
                && point.y() <= self.max.y()
        }

        #[inline]
        pub fn center(&self) -> Point2 {
            debug_assert!(!self.is_empty());
            let center = (self.min.as_vec2() + self.max.as_vec2()) * 0.5;
            Point2::from_vec(center)
        }
    }

    impl FromIterator<Point2> for Bounds2D {
        fn from_iter<I: IntoIterator<Item = Point2>>(iter: I) -> Self {
            let mut bounds = Bounds2D::empty();
            for point in iter {
                bounds.include_point(point);
            }
            bounds
        }
    }
}

pub mod primitive {
    use std::collections::HashMap;
    use std::f64::consts::{FRAC_PI_2, PI, TAU};

    use glam::DVec2;
    use serde::{Deserialize, Serialize};

    use crate::geometry::{Bounds2D, Point2, Point3, Vector2};

    /// 图元在一次解码结果中的序号，仅用于诊断输出。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
    pub struct PrimitiveId(u64);

    impl PrimitiveId {
        #[inline]
        pub fn new(raw: u64) -> Self {
            Self(raw)
        }

        #[inline]
        pub fn get(self) -> u64 {
            self.0
        }
    }

    /// 解码器交付的图元。每个变体只携带自身需要的字段。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub enum Primitive {
        Line(Line),
        Arc(Arc),
        Circle(Circle),
        Ellipse(Ellipse),
        Spline(Spline),
        Polyline(Polyline),
        Point(PointEntity),
        Insert(Insert),
    }

    impl Primitive {
        /// 图元类型名，沿用 DXF 实体名，便于日志对照原图纸。
        pub fn kind(&self) -> &'static str {
            match self {
                Primitive::Line(_) => "LINE",
                Primitive::Arc(_) => "ARC",
                Primitive::Circle(_) => "CIRCLE",
                Primitive::Ellipse(_) => "ELLIPSE",
                Primitive::Spline(_) => "SPLINE",
                Primitive::Polyline(_) => "LWPOLYLINE",
                Primitive::Point(_) => "POINT",
                Primitive::Insert(_) => "INSERT",
            }
        }

        /// 返回第一个非有限数值所在的字段名；全部有限时返回 `None`。
        pub fn non_finite_field(&self) -> Option<&'static str> {
            match self {
                Primitive::Line(line) => {
                    if !line.start.is_finite() {
                        Some("start")
                    } else if !line.end.is_finite() {
                        Some("end")
                    } else {
                        None
                    }
                }
                Primitive::Arc(arc) => {
                    if !arc.center.is_finite() {
                        Some("center")
                    } else if !arc.radius.is_finite() {
                        Some("radius")
                    } else if !arc.start_angle.is_finite() {
                        Some("start_angle")
                    } else if !arc.end_angle.is_finite() {
                        Some("end_angle")
                    } else {
                        None
                    }
                }
                Primitive::Circle(circle) => {
                    if !circle.center.is_finite() {
                        Some("center")
                    } else if !circle.radius.is_finite() {
                        Some("radius")
                    } else {
                        None
                    }
                }
                Primitive::Ellipse(ellipse) => {
                    if !ellipse.center.is_finite() {
                        Some("center")
                    } else if !ellipse.major_axis.is_finite() {
                        Some("major_axis")
                    } else if !ellipse.ratio.is_finite() {
                        Some("ratio")
                    } else if !ellipse.start_parameter.is_finite()
                        || !ellipse.end_parameter.is_finite()
                    {
                        Some("parameters")
                    } else {
                        None
                    }
                }
                Primitive::Spline(spline) => {
                    if spline.control_points.iter().any(|p| !p.is_finite()) {
                        Some("control_points")
                    } else if spline.fit_points.iter().any(|p| !p.is_finite()) {
                        Some("fit_points")
                    } else if spline.knots.iter().any(|k| !k.is_finite()) {
                        Some("knots")
                    } else if spline.weights.iter().any(|w| !w.is_finite()) {
                        Some("weights")
                    } else {
                        None
                    }
                }
                Primitive::Polyline(polyline) => {
                    if polyline.vertices.iter().any(|v| !v.position.is_finite()) {
                        Some("vertices")
                    } else if polyline.vertices.iter().any(|v| !v.bulge.is_finite()) {
                        Some("bulge")
                    } else {
                        None
                    }
                }
                Primitive::Point(point) => {
                    if point.position.is_finite() {
                        None
                    } else {
                        Some("position")
                    }
                }
                Primitive::Insert(insert) => {
                    if insert.insert.is_finite() {
                        None
                    } else {
                        Some("insert")
                    }
                }
            }
        }

        /// 平移所有坐标字段，返回新的图元。块参照展开时使用，只做平移，不处理旋转与缩放。
        pub fn translated(&self, offset: Vector2) -> Primitive {
            match self {
                Primitive::Line(line) => Primitive::Line(Line {
                    start: line.start.translate_xy(offset),
                    end: line.end.translate_xy(offset),
                }),
                Primitive::Arc(arc) => Primitive::Arc(Arc {
                    center: arc.center.translate(offset),
                    ..arc.clone()
                }),
                Primitive::Circle(circle) => Primitive::Circle(Circle {
                    center: circle.center.translate(offset),
                    radius: circle.radius,
                }),
                Primitive::Ellipse(ellipse) => Primitive::Ellipse(Ellipse {
                    center: ellipse.center.translate(offset),
                    ..ellipse.clone()
                }),
                Primitive::Spline(spline) => Primitive::Spline(Spline {
                    control_points: spline
                        .control_points
                        .iter()
                        .map(|point| point.translate(offset))
                        .collect(),
                    fit_points: spline
                        .fit_points
                        .iter()
                        .map(|point| point.translate(offset))
                        .collect(),
                    ..spline.clone()
                }),
                Primitive::Polyline(polyline) => Primitive::Polyline(Polyline {
                    vertices: polyline
                        .vertices
                        .iter()
                        .map(|vertex| {
                            PolylineVertex::with_bulge(vertex.position.translate(offset), vertex.bulge)
                        })
                        .collect(),
                    is_closed: polyline.is_closed,
                }),
                Primitive::Point(point) => Primitive::Point(PointEntity {
                    position: point.position.translate_xy(offset),
                }),
                Primitive::Insert(insert) => Primitive::Insert(Insert {
                    block_name: insert.block_name.clone(),
                    insert: insert.insert.translate(offset),
                }),
            }
        }

        /// 计算图元的 2D 轴对齐范围；块参照退化为插入点。
        pub fn bounds(&self) -> Option<Bounds2D> {
            let mut bounds = Bounds2D::empty();
            match self {
                Primitive::Line(line) => {
                    bounds.include_point(line.start.xy());
                    bounds.include_point(line.end.xy());
                }
                Primitive::Circle(circle) => {
                    let radius = circle.radius.abs();
                    let center = circle.center;
                    bounds.include_point(Point2::new(center.x() - radius, center.y() - radius));
                    bounds.include_point(Point2::new(center.x() + radius, center.y() + radius));
                }
                Primitive::Arc(arc) => arc_bounds(arc, &mut bounds),
                Primitive::Ellipse(ellipse) => ellipse_bounds(ellipse, &mut bounds),
                Primitive::Polyline(polyline) => {
                    for vertex in &polyline.vertices {
                        bounds.include_point(vertex.position);
                    }
                }
                Primitive::Spline(spline) => {
                    for point in spline.control_points.iter().chain(&spline.fit_points) {
                        bounds.include_point(*point);
                    }
                }
                Primitive::Point(point) => bounds.include_point(point.position.xy()),
                Primitive::Insert(insert) => bounds.include_point(insert.insert),
            }
            if bounds.is_empty() { None } else { Some(bounds) }
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Line {
        pub start: Point3,
        pub end: Point3,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Circle {
        pub center: Point2,
        pub radius: f64,
    }

    /// 圆弧，角度以弧度储存，始终按逆时针从起始角扫到终止角。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Arc {
        pub center: Point2,
        pub radius: f64,
        pub start_angle: f64,
        pub end_angle: f64,
    }

    /// 椭圆，记录主轴向量、短长轴比与参数范围（弧度）。
    /// 起止参数同为 0 表示未指定，即完整椭圆。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Ellipse {
        pub center: Point2,
        pub major_axis: Vector2,
        pub ratio: f64,
        pub start_parameter: f64,
        pub end_parameter: f64,
    }

    /// B 样条。`knots` 为空时使用拟合点；`weights` 非空时按有理样条求值。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Spline {
        pub degree: usize,
        pub control_points: Vec<Point2>,
        #[serde(default)]
        pub knots: Vec<f64>,
        #[serde(default)]
        pub weights: Vec<f64>,
        #[serde(default)]
        pub fit_points: Vec<Point2>,
        #[serde(default)]
        pub is_closed: bool,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Polyline {
        pub vertices: Vec<PolylineVertex>,
        pub is_closed: bool,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct PolylineVertex {
        pub position: Point2,
        pub bulge: f64,
    }

    impl PolylineVertex {
        #[inline]
        pub fn new(position: Point2) -> Self {
            Self {
                position,
                bulge: 0.0,
            }
        }

        #[inline]
        pub fn with_bulge(position: Point2, bulge: f64) -> Self {
            Self { position, bulge }
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct PointEntity {
        pub position: Point3,
    }

    /// 块参照。只支持平移插入，不含旋转和缩放。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Insert {
        pub block_name: String,
        pub insert: Point2,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct BlockDefinition {
        pub name: String,
        pub primitives: Vec<Primitive>,
    }

    /// 一次计算的输入：有序图元列表加上按名称索引的块定义表。
    #[derive(Debug, Default, Clone, Serialize, Deserialize)]
    pub struct Drawing {
        primitives: Vec<(PrimitiveId, Primitive)>,
        next_primitive_id: u64,
        #[serde(default)]
        blocks: HashMap<String, BlockDefinition>,
    }

    impl Drawing {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn add_line(&mut self, start: Point2, end: Point2) -> PrimitiveId {
            self.add_primitive(Primitive::Line(Line {
                start: start.into(),
                end: end.into(),
            }))
        }

        pub fn add_circle(&mut self, center: Point2, radius: f64) -> PrimitiveId {
            self.add_primitive(Primitive::Circle(Circle { center, radius }))
        }

        pub fn add_arc(
            &mut self,
            center: Point2,
            radius: f64,
            start_angle: f64,
            end_angle: f64,
        ) -> PrimitiveId {
            self.add_primitive(Primitive::Arc(Arc {
                center,
                radius,
                start_angle,
                end_angle,
            }))
        }

        pub fn add_ellipse(
            &mut self,
            center: Point2,
            major_axis: Vector2,
            ratio: f64,
            start_parameter: f64,
            end_parameter: f64,
        ) -> PrimitiveId {
            self.add_primitive(Primitive::Ellipse(Ellipse {
                center,
                major_axis,
                ratio,
                start_parameter,
                end_parameter,
            }))
        }

        pub fn add_polyline<I>(&mut self, points: I, is_closed: bool) -> PrimitiveId
        where
            I: IntoIterator<Item = Point2>,
        {
            self.add_polyline_with_vertices(points.into_iter().map(PolylineVertex::new), is_closed)
        }

        pub fn add_polyline_with_vertices<I>(&mut self, vertices: I, is_closed: bool) -> PrimitiveId
        where
            I: IntoIterator<Item = PolylineVertex>,
        {
            self.add_primitive(Primitive::Polyline(Polyline {
                vertices: vertices.into_iter().collect(),
                is_closed,
            }))
        }

        pub fn add_spline(
            &mut self,
            degree: usize,
            control_points: Vec<Point2>,
            knots: Vec<f64>,
            is_closed: bool,
        ) -> PrimitiveId {
            self.add_primitive(Primitive::Spline(Spline {
                degree,
                control_points,
                knots,
                weights: Vec::new(),
                fit_points: Vec::new(),
                is_closed,
            }))
        }

        pub fn add_point(&mut self, position: Point3) -> PrimitiveId {
            self.add_primitive(Primitive::Point(PointEntity { position }))
        }

        pub fn add_insert(&mut self, block_name: impl Into<String>, insert: Point2) -> PrimitiveId {
            self.add_primitive(Primitive::Insert(Insert {
                block_name: block_name.into(),
                insert,
            }))
        }

        pub fn add_primitive(&mut self, primitive: Primitive) -> PrimitiveId {
            let id = self.next_id();
            self.primitives.push((id, primitive));
            id
        }

        /// 注册块定义；同名定义会被覆盖。
        pub fn add_block_definition(&mut self, definition: BlockDefinition) {
            self.blocks.insert(definition.name.clone(), definition);
        }

        #[inline]
        pub fn block(&self, name: &str) -> Option<&BlockDefinition> {
            self.blocks.get(name)
        }

        #[inline]
        pub fn blocks(&self) -> impl Iterator<Item = &BlockDefinition> {
            self.blocks.values()
        }

        #[inline]
        pub fn primitives(&self) -> impl Iterator<Item = &(PrimitiveId, Primitive)> {
            self.primitives.iter()
        }

        #[inline]
        pub fn primitive(&self, id: PrimitiveId) -> Option<&Primitive> {
            self.primitives
                .iter()
                .find(|(primitive_id, _)| *primitive_id == id)
                .map(|(_, primitive)| primitive)
        }

        #[inline]
        pub fn len(&self) -> usize {
            self.primitives.len()
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.primitives.is_empty()
        }

        pub fn bounds(&self) -> Option<Bounds2D> {
            let mut bounds = Bounds2D::empty();
            for (_, primitive) in &self.primitives {
                if let Some(primitive_bounds) = primitive.bounds() {
                    bounds.include_bounds(&primitive_bounds);
                }
            }
            if bounds.is_empty() { None } else { Some(bounds) }
        }

        fn next_id(&mut self) -> PrimitiveId {
            let id = self.next_primitive_id;
            self.next_primitive_id += 1;
            PrimitiveId(id)
        }
    }

    fn normalize_angle(angle: f64) -> f64 {
        let mut result = angle % TAU;
        if result < 0.0 {
            result += TAU;
        }
        result
    }

    fn canonical_interval(start: f64, end: f64) -> (f64, f64) {
        let start = normalize_angle(start);
        let mut end = normalize_angle(end);
        if (end - start).abs() < 1e-9 {
            end = start + TAU;
        } else if end < start {
            end += TAU;
        }
        (start, end)
    }

    fn arc_point(center: Point2, radius: f64, angle: f64) -> Point2 {
        center.translate(Vector2::new(radius * angle.cos(), radius * angle.sin()))
    }

    fn arc_bounds(arc: &Arc, bounds: &mut Bounds2D) {
        let radius = arc.radius.abs();
        if radius <= f64::EPSILON {
            bounds.include_point(arc.center);
            return;
        }

        let (start, end) = canonical_interval(arc.start_angle, arc.end_angle);
        bounds.include_point(arc_point(arc.center, radius, start));
        bounds.include_point(arc_point(arc.center, radius, end));

        const QUADRANTS: [f64; 4] = [0.0, FRAC_PI_2, PI, FRAC_PI_2 * 3.0];
        for base in QUADRANTS {
            let mut candidate = base;
            while candidate < start {
                candidate += TAU;
            }
            if candidate <= end {
                bounds.include_point(arc_point(arc.center, radius, candidate));
            }
        }
    }

    fn ellipse_bounds(ellipse: &Ellipse, bounds: &mut Bounds2D) {
        let major_vec = ellipse.major_axis.as_vec2();
        let major_length = major_vec.length();
        if major_length <= f64::EPSILON {
            bounds.include_point(ellipse.center);
            return;
        }
        let major_dir = major_vec / major_length;
        let minor_vec = DVec2::new(-major_dir.y, major_dir.x) * major_length * ellipse.ratio.abs();

        let (start, end) = canonical_interval(ellipse.start_parameter, ellipse.end_parameter);
        let span = end - start;
        let step_count = ((span / (TAU / 64.0)).ceil() as usize).max(16);
        for i in 0..=step_count {
            let t = start + span * (i as f64 / step_count as f64);
            let offset = major_vec * t.cos() + minor_vec * t.sin();
            bounds.include_point(ellipse.center.translate(Vector2::from(offset)));
        }
    }

}
