use super::xml_utils::{XmlResult, XmlWriter};
use crate::core::*;

/// Identifier of the root element; the signature's main reference points here.
pub const ROOT_ID: &str = "comprobante";

/// Version of the `factura` schema produced.
pub const FACTURA_VERSION: &str = "1.1.0";

/// Render a [`TaxDocument`] as an SRI `factura` v1.1.0.
///
/// Output is deterministic: identical documents produce identical bytes.
pub fn to_factura_xml(doc: &TaxDocument) -> XmlResult {
    let mut w = XmlWriter::new()?;

    w.start_element_with_attrs("factura", &[("id", ROOT_ID), ("version", FACTURA_VERSION)])?;
    write_info_tributaria(&mut w, doc)?;
    write_info_factura(&mut w, doc)?;
    write_detalles(&mut w, doc)?;
    write_info_adicional(&mut w, doc)?;
    w.end_element("factura")?;

    w.into_string()
}

fn write_info_tributaria(w: &mut XmlWriter, doc: &TaxDocument) -> Result<(), FacturaError> {
    let issuer = &doc.issuer;
    w.start_element("infoTributaria")?;
    w.text_element("ambiente", doc.environment.code())?;
    w.text_element("tipoEmision", doc.emission_type.code())?;
    w.text_element("razonSocial", &issuer.legal_name)?;
    w.optional_element("nombreComercial", issuer.trade_name.as_deref())?;
    w.text_element("ruc", &issuer.ruc)?;
    w.text_element("claveAcceso", doc.access_key.as_str())?;
    w.text_element("codDoc", doc.document_type.code())?;
    w.text_element("estab", &issuer.establishment_code())?;
    w.text_element("ptoEmi", &issuer.emission_point_code())?;
    w.text_element("secuencial", &doc.sequential.to_string())?;
    w.text_element("dirMatriz", issuer.head_office())?;
    w.optional_element("agenteRetencion", issuer.retention_agent.as_deref())?;
    w.optional_element("contribuyenteRimpe", issuer.rimpe.as_deref())?;
    w.end_element("infoTributaria")?;
    Ok(())
}

fn write_info_factura(w: &mut XmlWriter, doc: &TaxDocument) -> Result<(), FacturaError> {
    let issuer = &doc.issuer;
    let buyer = &doc.buyer;
    w.start_element("infoFactura")?;
    w.text_element("fechaEmision", &doc.issue_date.format("%d/%m/%Y").to_string())?;
    w.optional_element("dirEstablecimiento", issuer.establishment_address.as_deref())?;
    w.optional_element("contribuyenteEspecial", issuer.special_taxpayer.as_deref())?;
    w.text_element(
        "obligadoContabilidad",
        if issuer.obligated_accounting { "SI" } else { "NO" },
    )?;
    w.text_element("tipoIdentificacionComprador", buyer.id_type.code())?;
    w.text_element("razonSocialComprador", &buyer.name)?;
    w.text_element("identificacionComprador", &buyer.identification)?;
    w.optional_element("direccionComprador", buyer.address.as_deref())?;
    w.amount_element("totalSinImpuestos", doc.subtotal)?;
    w.amount_element("totalDescuento", doc.total_discount)?;

    w.start_element("totalConImpuestos")?;
    for bucket in &doc.buckets {
        w.start_element("totalImpuesto")?;
        w.text_element("codigo", VAT_TAX_CODE)?;
        w.text_element("codigoPorcentaje", &bucket.rate_code)?;
        w.amount_element("baseImponible", bucket.base)?;
        w.amount_element("valor", bucket.tax)?;
        w.end_element("totalImpuesto")?;
    }
    w.end_element("totalConImpuestos")?;

    w.amount_element("propina", doc.tip)?;
    w.amount_element("importeTotal", doc.total)?;
    w.text_element("moneda", &doc.currency)?;

    w.start_element("pagos")?;
    for payment in &doc.payments {
        w.start_element("pago")?;
        w.text_element("formaPago", &payment.method_code)?;
        w.amount_element("total", payment.total)?;
        w.optional_element("plazo", payment.term.as_deref())?;
        w.optional_element("unidadTiempo", payment.time_unit.as_deref())?;
        w.end_element("pago")?;
    }
    w.end_element("pagos")?;

    w.end_element("infoFactura")?;
    Ok(())
}

fn write_detalles(w: &mut XmlWriter, doc: &TaxDocument) -> Result<(), FacturaError> {
    w.start_element("detalles")?;
    for line in &doc.lines {
        w.start_element("detalle")?;
        w.text_element("codigoPrincipal", &line.code)?;
        w.text_element("descripcion", &line.description)?;
        w.decimal_element("cantidad", line.quantity)?;
        w.decimal_element("precioUnitario", line.unit_price)?;
        w.amount_element("descuento", line.discount)?;
        w.amount_element("precioTotalSinImpuesto", line.base)?;
        w.start_element("impuestos")?;
        w.start_element("impuesto")?;
        w.text_element("codigo", VAT_TAX_CODE)?;
        w.text_element("codigoPorcentaje", &line.rate_code)?;
        w.decimal_element("tarifa", line.rate)?;
        w.amount_element("baseImponible", line.base)?;
        w.amount_element("valor", line.tax)?;
        w.end_element("impuesto")?;
        w.end_element("impuestos")?;
        w.end_element("detalle")?;
    }
    w.end_element("detalles")?;
    Ok(())
}

fn write_info_adicional(w: &mut XmlWriter, doc: &TaxDocument) -> Result<(), FacturaError> {
    if doc.additional.is_empty() {
        return Ok(());
    }
    w.start_element("infoAdicional")?;
    for field in &doc.additional {
        w.text_element_with_attrs("campoAdicional", &field.value, &[("nombre", field.name.as_str())])?;
    }
    w.end_element("infoAdicional")?;
    Ok(())
}
