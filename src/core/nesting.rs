//! Placement of nested domains inside their parents.
//!
//! Every child grid must end on a parent cell boundary, so its cell count is
//! tied to the offset it starts at. For each level the aligner scans every
//! feasible offset and keeps the one whose resulting count is closest to the
//! requested count. The scan order decides ties and is part of the contract.

use crate::domain::model::{GridLayout, NestingSpec, OuterDomainSpec};
use crate::utils::error::{PipelineError, Result};
use crate::utils::validation::validate_min_len;

/// Child cell count produced by starting at parent cell `offset`.
pub fn child_count(parent_count: u32, offset: u32, ratio: u32) -> i64 {
    (i64::from(parent_count) - 2 * i64::from(offset) - 1) * i64::from(ratio) + 1
}

/// Best `(count, offset)` along one axis; first minimizer wins.
pub fn align_axis(
    parent_count: u32,
    ratio: u32,
    desired: u32,
    level: usize,
    axis: &'static str,
) -> Result<(u32, u32)> {
    let last_offset = (parent_count / 2).saturating_sub(1);
    if last_offset < 1 {
        return Err(PipelineError::NestingInfeasible {
            level,
            axis,
            parent_count,
        });
    }

    let mut best: Option<(i64, u32, i64)> = None;
    for offset in 1..=last_offset {
        let count = child_count(parent_count, offset, ratio);
        let distance = (count - i64::from(desired)).abs();
        match best {
            Some((_, _, best_distance)) if distance >= best_distance => {}
            _ => best = Some((count, offset, distance)),
        }
    }

    let (count, offset, _) = best.ok_or(PipelineError::NestingInfeasible {
        level,
        axis,
        parent_count,
    })?;
    // parent >= 4 and offset <= parent/2 - 1 keep the factor positive.
    let count = u32::try_from(count).map_err(|_| PipelineError::NestingInfeasible {
        level,
        axis,
        parent_count,
    })?;
    Ok((count, offset))
}

pub fn align_domains(outer: &OuterDomainSpec, nesting: &NestingSpec) -> Result<Vec<GridLayout>> {
    nesting.check()?;
    validate_min_len("domain.e_we", &outer.e_we, nesting.max_dom)?;
    validate_min_len("domain.e_sn", &outer.e_sn, nesting.max_dom)?;

    let mut layouts = Vec::with_capacity(nesting.max_dom);
    layouts.push(GridLayout {
        e_we: outer.e_we[0],
        e_sn: outer.e_sn[0],
        i_parent_start: 1,
        j_parent_start: 1,
        dx: outer.dx,
        dy: outer.dy,
    });

    for level in 1..nesting.max_dom {
        let parent = &layouts[level - 1];
        let ratio = nesting.ratio(level)?;
        let (e_we, i_parent_start) =
            align_axis(parent.e_we, ratio, outer.e_we[level], level, "west-east")?;
        let (e_sn, j_parent_start) =
            align_axis(parent.e_sn, ratio, outer.e_sn[level], level, "south-north")?;

        tracing::debug!(
            level,
            e_we,
            e_sn,
            i_parent_start,
            j_parent_start,
            "aligned nested domain"
        );

        let child = GridLayout {
            e_we,
            e_sn,
            i_parent_start,
            j_parent_start,
            dx: parent.dx / f64::from(ratio),
            dy: parent.dy / f64::from(ratio),
        };
        layouts.push(child);
    }

    Ok(layouts)
}
