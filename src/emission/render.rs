use std::fmt::Write;

use super::state::{EmissionRecord, EmissionState};
use crate::core::FacturaError;
use crate::xml::xml_utils::{format_amount, format_decimal};

/// Produces the human-readable representation of an emitted document.
pub trait DocumentRenderer: Send + Sync {
    fn render(&self, record: &EmissionRecord) -> Result<Vec<u8>, FacturaError>;
}

/// Plain-text receipt, one line per item.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextRenderer;

impl DocumentRenderer for TextRenderer {
    fn render(&self, record: &EmissionRecord) -> Result<Vec<u8>, FacturaError> {
        let mut out = String::new();
        write_receipt(&mut out, record)
            .map_err(|e| FacturaError::Xml(format!("cannot render document: {e}")))?;
        Ok(out.into_bytes())
    }
}

fn write_receipt(out: &mut String, record: &EmissionRecord) -> std::fmt::Result {
    writeln!(out, "FACTURA No. {}", record.sequential)?;
    writeln!(out, "Fecha: {}", record.issue_date.format("%d/%m/%Y"))?;
    writeln!(out, "Clave de acceso: {}", record.access_key)?;
    writeln!(out, "Estado: {}", record.state)?;
    if record.state == EmissionState::Authorized {
        if let Some(number) = &record.authorization_number {
            writeln!(out, "Autorizacion: {number}")?;
        }
        if let Some(date) = &record.authorization_date {
            writeln!(out, "Fecha autorizacion: {date}")?;
        }
    }
    writeln!(out)?;
    writeln!(
        out,
        "Cliente: {} ({})",
        record.buyer.name, record.buyer.identification
    )?;
    if let Some(address) = &record.buyer.address {
        writeln!(out, "Direccion: {address}")?;
    }
    writeln!(out)?;

    for line in &record.lines {
        writeln!(
            out,
            "{:<10} {:<30} {:>8} x {:>10} = {:>10}",
            line.code,
            line.description,
            format_decimal(line.quantity),
            format_amount(line.unit_price),
            format_amount(line.base)
        )?;
    }
    writeln!(out)?;
    writeln!(out, "Subtotal gravado: {:>12}", format_amount(record.subtotal_taxed))?;
    writeln!(out, "Subtotal 0%:      {:>12}", format_amount(record.subtotal_zero))?;
    writeln!(out, "IVA:              {:>12}", format_amount(record.vat))?;
    writeln!(out, "TOTAL:            {:>12}", format_amount(record.total))?;
    Ok(())
}
