use std::net::{Ipv4Addr, SocketAddr};

use hickory_client::proto::op::{Message, MessageType, ResponseCode};
use hickory_client::proto::rr::rdata::A;
use hickory_client::proto::rr::{RData, Record};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, UdpSocket};

/// Address returned for listed names.
pub const LISTED_ADDR: Ipv4Addr = Ipv4Addr::new(127, 0, 0, 2);

/// How the local nameserver answers each query.
#[derive(Debug, Clone, Copy)]
pub enum Reply {
    /// Header-only response carrying this code.
    Code(ResponseCode),
    /// A record for this name, NXDOMAIN for anything else.
    Listed(&'static str),
    /// Never answers.
    Silent,
}

/// Spawns a UDP nameserver on localhost answering every query with `reply`.
pub async fn nameserver(reply: Reply) -> SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();

    tokio::spawn(async move {
        let mut buf = [0u8; 512];
        loop {
            let Ok((len, peer)) = socket.recv_from(&mut buf).await else {
                return;
            };
            let Ok(request) = Message::from_vec(&buf[..len]) else {
                continue;
            };

            let mut response = Message::new();
            response
                .set_id(request.id())
                .set_message_type(MessageType::Response)
                .set_op_code(request.op_code())
                .add_queries(request.queries().to_vec());

            match reply {
                Reply::Silent => continue,
                Reply::Code(code) => {
                    response.set_response_code(code);
                }
                Reply::Listed(listed) => {
                    let Some(query) = request.queries().first() else {
                        continue;
                    };
                    let name = query.name().to_ascii();
                    if name.trim_end_matches('.') == listed {
                        response.set_response_code(ResponseCode::NoError);
                        response.add_answer(Record::from_rdata(
                            query.name().clone(),
                            60,
                            RData::A(A(LISTED_ADDR)),
                        ));
                    } else {
                        response.set_response_code(ResponseCode::NXDomain);
                    }
                }
            }

            let bytes = response.to_vec().unwrap();
            let _ = socket.send_to(&bytes, peer).await;
        }
    });

    addr
}

/// Spawns an HTTP server on localhost answering every request with 200 and `body`.
pub async fn echo_server(body: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = stream.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 200 OK\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });

    addr
}
