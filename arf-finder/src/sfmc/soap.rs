//! SOAP `Retrieve` requests and response parsing
//!
//! Requests are built from a typed filter tree and rendered with XML
//! escaping. Responses are flattened into [`Record`]s keyed by the dotted
//! element path below each `Results` element (`Name`, `ParentFolder.ID`,
//! `SendDefinitionList.CustomObjectID`, ...).

use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SoapError {
    #[error("SOAP fault: {0}")]
    Fault(String),

    #[error("Retrieve failed with status {status}: {message}")]
    Status { status: String, message: String },

    #[error("Malformed SOAP response: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equals,
    NotEquals,
    Like,
}

impl Operator {
    fn as_str(self) -> &'static str {
        match self {
            Operator::Equals => "equals",
            Operator::NotEquals => "notEquals",
            Operator::Like => "like",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Logical {
    And,
    Or,
}

impl Logical {
    fn as_str(self) -> &'static str {
        match self {
            Logical::And => "AND",
            Logical::Or => "OR",
        }
    }
}

/// Retrieve filter tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SoapFilter {
    Simple {
        property: String,
        operator: Operator,
        value: String,
    },
    Complex {
        left: Box<SoapFilter>,
        logical: Logical,
        right: Box<SoapFilter>,
    },
}

impl SoapFilter {
    pub fn equals(property: &str, value: impl Into<String>) -> Self {
        SoapFilter::Simple {
            property: property.to_string(),
            operator: Operator::Equals,
            value: value.into(),
        }
    }

    pub fn not_equals(property: &str, value: impl Into<String>) -> Self {
        SoapFilter::Simple {
            property: property.to_string(),
            operator: Operator::NotEquals,
            value: value.into(),
        }
    }

    pub fn like(property: &str, value: impl Into<String>) -> Self {
        SoapFilter::Simple {
            property: property.to_string(),
            operator: Operator::Like,
            value: value.into(),
        }
    }

    pub fn and(self, right: SoapFilter) -> Self {
        SoapFilter::Complex {
            left: Box::new(self),
            logical: Logical::And,
            right: Box::new(right),
        }
    }

    fn render(&self, element: &str, out: &mut String) {
        match self {
            SoapFilter::Simple {
                property,
                operator,
                value,
            } => {
                out.push_str(&format!(
                    "<{element} xsi:type=\"SimpleFilterPart\"><Property>{}</Property>\
                     <SimpleOperator>{}</SimpleOperator><Value>{}</Value></{element}>",
                    escape(property.as_str()),
                    operator.as_str(),
                    escape(value.as_str()),
                ));
            }
            SoapFilter::Complex {
                left,
                logical,
                right,
            } => {
                out.push_str(&format!("<{element} xsi:type=\"ComplexFilterPart\">"));
                left.render("LeftOperand", out);
                out.push_str(&format!("<LogicalOperator>{}</LogicalOperator>", logical.as_str()));
                right.render("RightOperand", out);
                out.push_str(&format!("</{element}>"));
            }
        }
    }
}

/// One `Retrieve` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrieveRequest {
    pub object_type: &'static str,
    pub properties: Vec<&'static str>,
    pub filter: Option<SoapFilter>,
    pub query_all_accounts: bool,
    /// Request id of a previous page when continuing a large result set
    pub continue_request: Option<String>,
}

impl RetrieveRequest {
    pub fn new(object_type: &'static str, properties: &[&'static str]) -> Self {
        Self {
            object_type,
            properties: properties.to_vec(),
            filter: None,
            query_all_accounts: false,
            continue_request: None,
        }
    }

    pub fn filter(mut self, filter: SoapFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn all_accounts(mut self) -> Self {
        self.query_all_accounts = true;
        self
    }

    /// Same request, continuing from a `MoreDataAvailable` response
    pub fn continuation(&self, request_id: &str) -> Self {
        let mut next = self.clone();
        next.continue_request = Some(request_id.to_string());
        next
    }

    /// Full SOAP 1.2 envelope with the OAuth token header
    pub fn envelope(&self, endpoint: &str, token: &str) -> String {
        let mut body = String::new();
        body.push_str(&format!("<ObjectType>{}</ObjectType>", self.object_type));
        for property in &self.properties {
            body.push_str(&format!("<Properties>{}</Properties>", property));
        }
        if let Some(filter) = &self.filter {
            filter.render("Filter", &mut body);
        }
        if let Some(request_id) = &self.continue_request {
            body.push_str(&format!(
                "<ContinueRequest>{}</ContinueRequest>",
                escape(request_id.as_str())
            ));
        }
        if self.query_all_accounts {
            body.push_str("<QueryAllAccounts>true</QueryAllAccounts>");
        }

        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope" xmlns:a="http://schemas.xmlsoap.org/ws/2004/08/addressing" xmlns:u="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd">
<s:Header>
<a:Action s:mustUnderstand="1">Retrieve</a:Action>
<a:To s:mustUnderstand="1">{endpoint}</a:To>
<fueloauth xmlns="http://exacttarget.com">{token}</fueloauth>
</s:Header>
<s:Body xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xmlns:xsd="http://www.w3.org/2001/XMLSchema">
<RetrieveRequestMsg xmlns="http://exacttarget.com/wsdl/partnerAPI">
<RetrieveRequest>{body}</RetrieveRequest>
</RetrieveRequestMsg>
</s:Body>
</s:Envelope>"#,
            endpoint = escape(endpoint),
            token = escape(token),
            body = body,
        )
    }
}

/// One `Results` element flattened to path → text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record(HashMap<String, String>);

impl Record {
    /// Text at a dotted path, empty when absent
    pub fn get(&self, path: &str) -> &str {
        self.0.get(path).map(String::as_str).unwrap_or("")
    }

    #[cfg(test)]
    pub(crate) fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        Record(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetrieveResponse {
    pub overall_status: String,
    pub request_id: String,
    pub results: Vec<Record>,
}

impl RetrieveResponse {
    pub fn has_more(&self) -> bool {
        self.overall_status == "MoreDataAvailable" && !self.request_id.is_empty()
    }
}

/// Parse a `RetrieveResponseMsg` envelope
///
/// SOAP faults and error statuses become errors.
pub fn parse_retrieve_response(xml: &str) -> Result<RetrieveResponse, SoapError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<String> = Vec::new();
    let mut response = RetrieveResponse::default();
    let mut record: Option<(usize, HashMap<String, String>)> = None;
    let mut fault: Option<String> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| SoapError::Parse(e.to_string()))?;

        match event {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                let opens_record = name == "Results"
                    && stack.last().map(String::as_str) == Some("RetrieveResponseMsg");
                stack.push(name);
                if opens_record {
                    record = Some((stack.len(), HashMap::new()));
                }
                if stack.last().map(String::as_str) == Some("Fault") && fault.is_none() {
                    fault = Some(String::new());
                }
            }
            Event::End(_) => {
                if let Some((depth, _)) = &record {
                    if stack.len() == *depth {
                        if let Some((_, fields)) = record.take() {
                            response.results.push(Record(fields));
                        }
                    }
                }
                stack.pop();
            }
            Event::Text(t) => {
                let text = t
                    .unescape()
                    .map_err(|e| SoapError::Parse(e.to_string()))?
                    .into_owned();
                handle_text(&stack, text, &mut record, &mut response, &mut fault);
            }
            Event::CData(c) => {
                let text = String::from_utf8_lossy(&c.into_inner()).into_owned();
                handle_text(&stack, text, &mut record, &mut response, &mut fault);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(message) = fault {
        return Err(SoapError::Fault(message));
    }

    let status = response.overall_status.as_str();
    if status.starts_with("Error") {
        return Err(SoapError::Status {
            status: status.to_string(),
            message: format!("{} partial results discarded", response.results.len()),
        });
    }

    Ok(response)
}

fn handle_text(
    stack: &[String],
    text: String,
    record: &mut Option<(usize, HashMap<String, String>)>,
    response: &mut RetrieveResponse,
    fault: &mut Option<String>,
) {
    if let Some(message) = fault.as_mut() {
        // faultstring (1.1) or Reason/Text (1.2); keep the first one
        let is_reason = matches!(
            stack.last().map(String::as_str),
            Some("faultstring") | Some("Text")
        );
        if is_reason && message.is_empty() {
            *message = text;
        }
        return;
    }

    if let Some((depth, fields)) = record.as_mut() {
        if stack.len() > *depth {
            let path = stack[*depth..].join(".");
            fields.entry(path).or_insert(text);
        }
        return;
    }

    let parent = stack.len().checked_sub(2).map(|i| stack[i].as_str());
    if parent == Some("RetrieveResponseMsg") {
        match stack.last().map(String::as_str) {
            Some("OverallStatus") => response.overall_status = text,
            Some("RequestID") => response.request_id = text,
            _ => {}
        }
    }
}
