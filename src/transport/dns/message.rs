//! Adapter between raw datagrams and `hickory-proto` messages
//!
//! Only the first question of a standard query is considered.

use std::net::Ipv4Addr;

use hickory_proto::{
    op::{Message, MessageType, OpCode, Query, ResponseCode},
    rr::{DNSClass, RData, Record, RecordType, rdata::A},
};

pub const ANSWER_TTL: u32 = 300;

/// Decoded standard query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsQuery {
    pub id: u16,
    pub recursion_desired: bool,
    /// Dotted name, lowercased, without trailing dot
    pub name: String,
    query: Query,
}

impl DnsQuery {
    pub fn is_address_query(&self) -> bool {
        self.query.query_type() == RecordType::A && self.query.query_class() == DNSClass::IN
    }
}

/// Decode a standard query, `None` for anything else
pub fn parse_query(packet: &[u8]) -> Option<DnsQuery> {
    let message = Message::from_vec(packet).ok()?;
    if message.message_type() != MessageType::Query || message.op_code() != OpCode::Query {
        return None;
    }
    let query = message.queries().first()?.clone();
    let name = query
        .name()
        .to_ascii()
        .trim_end_matches('.')
        .to_ascii_lowercase();

    Some(DnsQuery {
        id: message.id(),
        recursion_desired: message.recursion_desired(),
        name,
        query,
    })
}

/// Encode the answer to `query`
///
/// With `address` set the response carries one A record, otherwise no
/// answer and the given `rcode`.
pub fn build_response(
    query: &DnsQuery,
    address: Option<Ipv4Addr>,
    rcode: ResponseCode,
) -> Option<Vec<u8>> {
    let mut response = Message::new();
    response
        .set_id(query.id)
        .set_message_type(MessageType::Response)
        .set_op_code(OpCode::Query)
        .set_authoritative(true)
        .set_recursion_desired(query.recursion_desired)
        .set_recursion_available(true)
        .set_response_code(rcode);
    response.add_query(query.query.clone());

    if let Some(address) = address {
        response.add_answer(Record::from_rdata(
            query.query.name().clone(),
            ANSWER_TTL,
            RData::A(A(address)),
        ));
    }

    response.to_vec().ok()
}

#[cfg(test)]
pub(crate) fn encode_query(id: u16, name: &str, record_type: RecordType) -> Vec<u8> {
    use hickory_proto::rr::Name;

    let mut message = Message::new();
    message
        .set_id(id)
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Query)
        .set_recursion_desired(true);
    message.add_query(Query::query(
        Name::from_ascii(name).expect("valid name"),
        record_type,
    ));
    message.to_vec().expect("encodable query")
}
