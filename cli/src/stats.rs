use messbook_core::service::dto::{HouseSummaryDto, MemberRowDto};
use messbook_core::{MonthlySnapshot, SnapshotDto, StatsView, ViewState};
use tabled::settings::object::{Cell, Columns, Rows};
use tabled::settings::{Alignment, Color, Modify, Style};
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct MemberRow {
    #[tabled(rename = "Member")]
    name: String,
    #[tabled(rename = "Meals")]
    meal: String,
    #[tabled(rename = "Deposit")]
    deposit: String,
    #[tabled(rename = "Common")]
    common: String,
    #[tabled(rename = "Meal cost")]
    meal_cost: String,
    #[tabled(rename = "Guest")]
    guest: String,
    #[tabled(rename = "Total cost")]
    total: String,
    #[tabled(rename = "Balance")]
    balance: String,
}

impl From<&MemberRowDto> for MemberRow {
    fn from(row: &MemberRowDto) -> Self {
        Self {
            name: row.name.clone(),
            meal: row.meal.clone(),
            deposit: row.deposit.clone(),
            common: row.common_charge.clone(),
            meal_cost: row.meal_cost.clone(),
            guest: row.guest_meal_cost.clone(),
            total: row.total_cost.clone(),
            balance: row.balance.clone(),
        }
    }
}

#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "")]
    label: &'static str,
    #[tabled(rename = "")]
    value: String,
}

fn summary_rows(house: &HouseSummaryDto) -> Vec<SummaryRow> {
    vec![
        SummaryRow { label: "Total meals", value: house.total_meal.clone() },
        SummaryRow { label: "Total bazar", value: house.total_bazar.clone() },
        SummaryRow { label: "Cost per meal", value: house.cost_per_meal.clone() },
        SummaryRow { label: "Total deposit", value: house.total_deposit.clone() },
        SummaryRow { label: "Remaining", value: house.remaining_money.clone() },
        SummaryRow { label: "Guest meals", value: house.total_guest_meal.clone() },
    ]
}

pub fn show_snapshot(snapshot: &MonthlySnapshot, stale: bool) {
    let dto = SnapshotDto::from_snapshot(snapshot);

    let marker = if stale { " \x1b[33m(cached)\x1b[0m" } else { "" };
    println!("\n\x1b[1;36m{}\x1b[0m{}", dto.house.month, marker);

    let mut summary = Table::new(summary_rows(&dto.house));
    summary
        .with(Style::rounded())
        .with(Modify::new(Columns::last()).with(Alignment::right()));
    println!("{}", summary);

    if dto.members.is_empty() {
        println!("No members yet. Add one with `messbook member add <name>`.");
        return;
    }

    let rows: Vec<MemberRow> = dto.members.iter().map(MemberRow::from).collect();
    let mut table = Table::new(rows);
    table
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
        .with(Modify::new(Rows::first()).with(Color::FG_CYAN));
    for (i, row) in dto.members.iter().enumerate() {
        if row.owes {
            table.with(Modify::new(Cell::new(i + 1, 7)).with(Color::FG_RED));
        }
    }
    println!("{}", table);
}

/// Prints whatever the view holds; an error line accompanies a stale snapshot.
pub fn show_view(state: &ViewState) {
    match &state.view {
        StatsView::Loading => println!("No statistics available for {}.", state.month.label()),
        StatsView::StaleButAvailable(snapshot) => show_snapshot(snapshot, true),
        StatsView::Fresh(snapshot) => show_snapshot(snapshot, false),
    }
    if let Some(err) = &state.last_error {
        eprintln!("\x1b[31mFailed to calculate statistics: {}\x1b[0m", err);
    }
}
