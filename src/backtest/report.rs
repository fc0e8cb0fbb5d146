//! Plain-text rendering of a finished backtest.

use std::fmt;

use super::object::BacktestResult;

/// Summary cards, chart span and trade list of a finished backtest
pub struct Report<'a>(pub &'a BacktestResult);

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let result = self.0;

        writeln!(f, "Final value    {:>14.2}", result.final_value)?;
        writeln!(
            f,
            "Net {:<10} {:>14.2}",
            if result.pnl >= 0.0 { "profit" } else { "loss" },
            result.pnl
        )?;
        match result.sharpe_ratio {
            Some(sharpe) => writeln!(f, "Sharpe ratio   {:>14.2}", sharpe)?,
            None => writeln!(f, "Sharpe ratio   {:>14}", "-")?,
        }
        writeln!(f, "Max drawdown   {:>13.2}%", result.max_drawdown)?;
        writeln!(f, "Trades         {:>14}", result.total_trades)?;
        writeln!(f, "Win rate       {:>13.2}%", result.win_rate * 100.0)?;

        if let (Some(first), Some(last)) = (result.chart_data.first(), result.chart_data.last()) {
            writeln!(
                f,
                "Bars           {:>14}  ({} .. {})",
                result.chart_data.len(),
                first.date,
                last.date
            )?;
        }

        if !result.trade_markers.is_empty() {
            writeln!(f)?;
            writeln!(f, "{:<20} {:<5} {:>12} {:>12}", "date", "side", "price", "amount")?;
            for marker in &result.trade_markers {
                writeln!(
                    f,
                    "{:<20} {:<5} {:>12.5} {:>12.2}",
                    marker.date, marker.side, marker.price, marker.amount
                )?;
            }
        }

        Ok(())
    }
}

/// Render the summary cards, chart span and trade list of a result
pub fn format_report(result: &BacktestResult) -> String {
    Report(result).to_string()
}
