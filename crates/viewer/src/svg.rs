use std::path::Path;

use kurbo::{Affine, BezPath, Rect, Shape};
use polarsim_geom::{GeometryParams, Point, ToKurbo as _};
use polarsim_simulator::Trajectory;
use svg::{node::element::Circle, Document};
use usvg::{tiny_skia_path::PathSegment, TreeParsing};

/// Scales and translates `path` so that it fills as much of `target` as possible.
pub fn fit(path: &mut BezPath, target: &Rect) {
    let bbox = path.bounding_box();
    if bbox.width() <= 0.0 && bbox.height() <= 0.0 {
        return;
    }
    let scale = (target.height() / bbox.height()).min(target.width() / bbox.width());

    let transform = Affine::translate(-bbox.center().to_vec2())
        .then_scale(scale)
        .then_translate(target.center().to_vec2());

    path.apply_affine(transform);
}

pub fn load_svg(path: &Path) -> anyhow::Result<BezPath> {
    let data = std::fs::read(path)?;
    parse_svg(&data)
}

/// Collects every path in an svg document into one `BezPath`, with all the
/// transforms (including those of enclosing groups) already applied.
pub fn parse_svg(data: &[u8]) -> anyhow::Result<BezPath> {
    let tree = usvg::Tree::from_data(data, &usvg::Options::default())?;
    let mut ret = BezPath::new();

    let cvt = |pt: usvg::tiny_skia_path::Point| kurbo::Point::new(pt.x as f64, pt.y as f64);

    for node in tree.root.descendants() {
        let usvg::NodeKind::Path(p) = &*node.borrow() else {
            continue;
        };
        let transform = node
            .ancestors()
            .skip(1)
            .fold(p.transform, |ts, parent| match &*parent.borrow() {
                usvg::NodeKind::Group(g) => g.transform.pre_concat(ts),
                _ => ts,
            });
        let map = |mut pt: usvg::tiny_skia_path::Point| {
            transform.map_point(&mut pt);
            cvt(pt)
        };

        for seg in p.data.segments() {
            match seg {
                PathSegment::MoveTo(pt) => ret.move_to(map(pt)),
                PathSegment::LineTo(pt) => ret.line_to(map(pt)),
                PathSegment::QuadTo(pt1, pt2) => ret.quad_to(map(pt1), map(pt2)),
                PathSegment::CubicTo(pt1, pt2, pt3) => {
                    ret.curve_to(map(pt1), map(pt2), map(pt3))
                }
                PathSegment::Close => ret.close_path(),
            }
        }
    }
    Ok(ret)
}

/// Draws the trajectory in paper coordinates, one dot per point, together
/// with the two spools.
pub fn illustrate(traj: &Trajectory, params: &GeometryParams) -> Document {
    let spools = [
        params.to_paper(Point::origin()),
        params.to_paper(Point::new(params.spool_distance.get(), 0.0)),
    ];
    let points: Vec<Point> = traj.points().iter().map(|p| params.to_paper(*p)).collect();

    let bbox = points
        .iter()
        .chain(&spools)
        .fold(Rect::from_points(spools[0].to_kurbo(), spools[1].to_kurbo()), |r, p| {
            r.union_pt(p.to_kurbo())
        });
    let margin = (bbox.width().max(bbox.height()) / 20.0).max(1.0);
    let bbox = bbox.inflate(margin, margin);
    let dot = (params.step_distance.get() as f64).max(margin / 50.0);

    let mut document =
        Document::new().set("viewBox", (bbox.x0, bbox.y0, bbox.width(), bbox.height()));
    for s in spools {
        document = document.add(
            Circle::new()
                .set("cx", s.x)
                .set("cy", s.y)
                .set("r", margin / 4.0)
                .set("fill", "blue"),
        );
    }
    for p in points {
        document = document.add(
            Circle::new()
                .set("cx", p.x)
                .set("cy", p.y)
                .set("r", dot)
                .set("fill", "black"),
        );
    }
    document
}
