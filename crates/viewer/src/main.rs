use std::{
    fs::File,
    io::BufWriter,
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{anyhow, Context as _};
use clap::{Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use polarsim_geom::GeometryParams;
use polarsim_planner::PlannerConfig;
use polarsim_protocol::file::{load_file, write_steps, Header, LoadedSteps};
use polarsim_simulator::{Dedup, Options, Simulation};

mod svg;

#[derive(Parser)]
struct Args {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Draw the picture that a step file would make.
    Render {
        #[arg(default_value = "input.txt")]
        path: PathBuf,

        /// Where to write the picture, as an svg.
        #[arg(long)]
        output: PathBuf,

        /// Also write the drawn points as json.
        #[arg(long)]
        json: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t = DedupArg::EmitAll)]
        dedup: DedupArg,

        #[command(flatten)]
        geometry: GeometryArgs,
    },
    /// Make a step file that draws an svg.
    Plan {
        svg: PathBuf,

        #[arg(long)]
        output: PathBuf,

        #[arg(long, default_value_t = 0.5)]
        accuracy: f64,

        /// Scale the drawing to fit in a box of this size, given as `width,height`.
        #[arg(long)]
        fit: Option<Size>,

        #[command(flatten)]
        geometry: GeometryArgs,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum DedupArg {
    EmitAll,
    SkipIdentical,
    SkipSamePixel,
}

impl From<DedupArg> for Dedup {
    fn from(d: DedupArg) -> Self {
        match d {
            DedupArg::EmitAll => Dedup::EmitAll,
            DedupArg::SkipIdentical => Dedup::SkipIdentical,
            DedupArg::SkipSamePixel => Dedup::SkipSamePixel,
        }
    }
}

/// Geometry given on the command line. These take precedence over the
/// ones in a step file's header.
#[derive(clap::Args, Debug, Default)]
struct GeometryArgs {
    #[arg(long)]
    step_distance: Option<f32>,
    #[arg(long)]
    spool_distance: Option<f32>,
    #[arg(long, allow_negative_numbers = true)]
    paper_offset_x: Option<f32>,
    #[arg(long, allow_negative_numbers = true)]
    paper_offset_y: Option<f32>,
    #[arg(long)]
    start_left: Option<f32>,
    #[arg(long)]
    start_right: Option<f32>,
}

impl GeometryArgs {
    fn header(&self) -> Header {
        Header {
            paper_offset_y: self.paper_offset_y,
            paper_offset_x: self.paper_offset_x,
            step_distance: self.step_distance,
            spool_distance: self.spool_distance,
            start_length_left: self.start_left,
            start_length_right: self.start_right,
        }
    }
}

#[derive(Clone, Debug)]
struct Size {
    width: f64,
    height: f64,
}

impl FromStr for Size {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (before, after) = s.split_once(',').ok_or_else(|| anyhow!("no comma"))?;

        Ok(Size {
            width: before.parse()?,
            height: after.parse()?,
        })
    }
}

/// Defaults, then the file's header, then the command line.
fn resolve_params(file_header: &Header, geometry: &GeometryArgs) -> GeometryParams {
    let mut params = GeometryParams::default();
    file_header.apply(&mut params);
    geometry.header().apply(&mut params);
    params
}

fn render(
    path: &Path,
    output: &Path,
    json: Option<&Path>,
    dedup: Dedup,
    geometry: &GeometryArgs,
) -> anyhow::Result<()> {
    // A missing file isn't fatal: we just have nothing to draw.
    let loaded = load_file(path).unwrap_or_else(|e| {
        log::error!("{e}");
        LoadedSteps::default()
    });
    let params = resolve_params(&loaded.header, geometry);
    log::debug!("geometry: {params:?}");

    let mut sim = Simulation::new(params, loaded.steps, Options { dedup });
    sim.recompute().context("failed to simulate the plotter")?;
    let traj = sim.trajectory();
    log::info!("drew {} points", traj.len());

    let document = svg::illustrate(traj, &sim.params);
    ::svg::save(output, &document).with_context(|| format!("writing {}", output.display()))?;

    if let Some(json) = json {
        let out = BufWriter::new(File::create(json)?);
        serde_json::to_writer(out, traj)?;
    }
    Ok(())
}

fn plan(
    svg_path: &Path,
    output: &Path,
    accuracy: f64,
    fit: Option<&Size>,
    geometry: &GeometryArgs,
) -> anyhow::Result<()> {
    let mut path = svg::load_svg(svg_path)?;
    if let Some(size) = fit {
        svg::fit(&mut path, &kurbo::Rect::new(0.0, 0.0, size.width, size.height));
    }

    let params = resolve_params(&Header::default(), geometry);
    let plan = polarsim_planner::plan(&path, &params, &PlannerConfig { accuracy })?;

    let out = BufWriter::new(File::create(output)?);
    write_steps(out, &Header::from_params(&plan.params), &plan.steps)?;
    log::info!("wrote {} steps to {}", plan.steps.len(), output.display());
    Ok(())
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::formatted_builder()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    let args = Args::parse();
    match &args.cmd {
        Cmd::Render {
            path,
            output,
            json,
            dedup,
            geometry,
        } => render(path, output, json.as_deref(), (*dedup).into(), geometry),
        Cmd::Plan {
            svg,
            output,
            accuracy,
            fit,
            geometry,
        } => plan(svg, output, *accuracy, fit.as_ref(), geometry),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_line_beats_header() {
        let file_header = Header {
            step_distance: Some(0.1),
            spool_distance: Some(400.0),
            ..Header::default()
        };
        let geometry = GeometryArgs {
            spool_distance: Some(300.0),
            ..GeometryArgs::default()
        };
        let params = resolve_params(&file_header, &geometry);
        assert_eq!(params.step_distance.get(), 0.1);
        assert_eq!(params.spool_distance.get(), 300.0);
        assert_eq!(params.start_lengths, GeometryParams::default().start_lengths);
    }

    #[test]
    fn parse_size() {
        let size: Size = "20,30.5".parse().unwrap();
        assert_eq!(size.width, 20.0);
        assert_eq!(size.height, 30.5);
        assert!("20".parse::<Size>().is_err());
    }

    #[test]
    fn cli() {
        use clap::CommandFactory as _;
        Args::command().debug_assert();

        let args = Args::try_parse_from([
            "polarsim",
            "render",
            "steps.txt",
            "--output",
            "out.svg",
            "--dedup",
            "skip-same-pixel",
            "--paper-offset-x",
            "-10",
        ])
        .unwrap();
        let Cmd::Render {
            path,
            dedup,
            geometry,
            ..
        } = args.cmd
        else {
            panic!("expected render");
        };
        assert_eq!(path, PathBuf::from("steps.txt"));
        assert!(matches!(dedup, DedupArg::SkipSamePixel));
        assert_eq!(geometry.paper_offset_x, Some(-10.0));
    }
}
