use crate::orchestrator::PlanReport;
use crate::types::CuttingPlanLine;

const MAX_WIDTH: f64 = 80.0;

/// Draws one tube as a three-row bar: each cut piece is a labelled box,
/// scrap at the right end is filled with dots.
pub fn render_tube(line: &CuttingPlanLine) -> String {
    if line.stock_length == 0 {
        return String::new();
    }
    let scale = MAX_WIDTH / line.stock_length as f64;
    let grid_w = (line.stock_length as f64 * scale).round() as usize;

    let mut grid = vec![vec![' '; grid_w + 1]; 3];
    draw_box(&mut grid, 0, grid_w);

    let mut offset = 0u64;
    for entry in &line.pattern {
        for _ in 0..entry.count {
            let sx = (offset as f64 * scale).round() as usize;
            offset += entry.length;
            let ex = (offset as f64 * scale).round() as usize;
            if ex <= sx {
                continue;
            }
            draw_box(&mut grid, sx, ex - sx);

            let label: Vec<char> = entry.length.to_string().chars().collect();
            let inner = ex - sx - 1;
            if label.len() <= inner {
                let start = sx + 1 + (inner - label.len()) / 2;
                for (i, &ch) in label.iter().enumerate() {
                    grid[1][start + i] = ch;
                }
            }
        }
    }

    let scrap_start = (offset as f64 * scale).round() as usize;
    for x in scrap_start + 1..grid_w {
        grid[1][x] = '.';
    }

    let mut result = String::new();
    for row in &grid {
        let line: String = row.iter().collect();
        result.push_str(line.trim_end());
        result.push('\n');
    }
    result
}

fn draw_box(grid: &mut [Vec<char>], x: usize, w: usize) {
    let cols = grid[0].len();
    for i in x..=x + w {
        if i >= cols {
            break;
        }
        for row in [0, 2] {
            grid[row][i] = if grid[row][i] == '+' { '+' } else { '-' };
        }
    }
    for cx in [x, x + w] {
        if cx < cols {
            grid[0][cx] = '+';
            grid[1][cx] = '|';
            grid[2][cx] = '+';
        }
    }
}

/// Fixed-width table of deduplicated patterns with a totals footer.
pub fn render_summary(report: &PlanReport) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<10} {:<10} {:>8} {:>5}  {:<40} {:>8}\n",
        "Thick(mm)", "Diam(mm)", "Stock", "Qty", "Cut Plan", "Scrap"
    ));
    out.push_str(&format!("{:-<88}\n", ""));
    for row in report.pattern_summary() {
        let plan = row
            .pattern
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join(" + ");
        out.push_str(&format!(
            "{:<10} {:<10} {:>8} {:>5}  {:<40} {:>8}\n",
            row.key.thickness.to_string(),
            row.key.diameter.to_string(),
            row.stock_length,
            row.quantity,
            plan,
            row.scrap
        ));
    }
    out.push_str(&format!("{:-<88}\n", ""));
    out.push_str(&format!(
        "{} tube{} used, {} mm scrap, {:.1}% utilization\n",
        report.tubes_used(),
        if report.tubes_used() == 1 { "" } else { "s" },
        report.total_scrap(),
        report.utilization_percent()
    ));
    out
}
