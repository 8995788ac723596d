//! CSV rendering for report downloads.

use crate::entities::{stock_transfer, transaction, TransferType};
use crate::services::reports::{Period, PeriodKind};

pub const TRANSACTION_HEADERS: [&str; 7] = [
    "ID Transaksi",
    "Tanggal",
    "Pelanggan",
    "Kasir",
    "Total",
    "Pembayaran",
    "Kembalian",
];

pub const TRANSFER_HEADERS: [&str; 11] = [
    "ID Transfer",
    "Tanggal",
    "Waktu",
    "Produk",
    "Tipe",
    "Jumlah",
    "Alasan",
    "Stok Sebelum",
    "Stok Setelah",
    "Petugas",
    "Catatan",
];

/// Quotes a field when it holds a comma, quote or line break.
pub fn csv_escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn render<I, R>(headers: &[&str], rows: I) -> String
where
    I: IntoIterator<Item = R>,
    R: IntoIterator<Item = String>,
{
    let mut lines = vec![headers
        .iter()
        .map(|h| csv_escape(h))
        .collect::<Vec<_>>()
        .join(",")];
    lines.extend(rows.into_iter().map(|row| {
        row.into_iter()
            .map(|f| csv_escape(&f))
            .collect::<Vec<_>>()
            .join(",")
    }));
    lines.join("\n")
}

pub fn transactions_csv(rows: &[transaction::Model]) -> String {
    render(
        &TRANSACTION_HEADERS,
        rows.iter().map(|t| {
            vec![
                t.id.to_string(),
                t.created_at.format("%d/%m/%Y %H.%M.%S").to_string(),
                t.customer.clone(),
                t.cashier_name.clone(),
                t.total.to_string(),
                t.payment.to_string(),
                t.change.to_string(),
            ]
        }),
    )
}

fn transfer_label(kind: TransferType) -> &'static str {
    match kind {
        TransferType::In => "Transfer In",
        TransferType::Out => "Transfer Out",
    }
}

pub fn transfers_csv(rows: &[stock_transfer::Model]) -> String {
    render(
        &TRANSFER_HEADERS,
        rows.iter().map(|t| {
            vec![
                t.id.to_string(),
                t.created_at.format("%d/%m/%Y").to_string(),
                t.created_at.format("%H.%M.%S").to_string(),
                t.product_name.clone(),
                transfer_label(t.transfer_type).to_string(),
                t.transfer_type.signed(t.quantity),
                t.reason.clone(),
                t.stock_before.to_string(),
                t.stock_after.to_string(),
                t.user_name.clone(),
                t.notes.clone().unwrap_or_default(),
            ]
        }),
    )
}

pub fn sales_filename(period: &Period) -> String {
    let scope = match period.kind {
        PeriodKind::Day => "harian",
        PeriodKind::Month => "bulanan",
        PeriodKind::Year => "tahunan",
    };
    format!("laporan-{}-{}.csv", scope, period.label())
}

pub fn transfers_filename(period: &Period) -> String {
    let scope = match period.kind {
        PeriodKind::Day => "harian",
        PeriodKind::Month => "bulanan",
        PeriodKind::Year => "tahunan",
    };
    format!("laporan-transfer-{}-{}.csv", scope, period.label())
}
