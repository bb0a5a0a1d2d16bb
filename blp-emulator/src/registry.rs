use crate::config::ConnId;
use log::debug;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::net::{Shutdown, TcpStream};
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum RegistryError {
    #[error("connection already exists: {0}")]
    AlreadyExists(ConnId),
}

/// Открытые клиентские соединения; при остановке сервера их сокеты
/// закрываются, чтобы разбудить потоки, ждущие кадра.
pub(crate) struct ConnectionRegistry {
    conns: Mutex<HashMap<ConnId, TcpStream>>,
}

impl ConnectionRegistry {
    pub(crate) fn new() -> Self {
        Self {
            conns: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ConnId, TcpStream>> {
        match self.conns.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(), // продолжаем, несмотря на poison
        }
    }

    pub(crate) fn add(&self, cid: ConnId, stream: TcpStream) -> Result<(), RegistryError> {
        match self.lock().entry(cid) {
            Entry::Vacant(e) => {
                e.insert(stream);
                Ok(())
            }
            Entry::Occupied(_) => Err(RegistryError::AlreadyExists(cid)),
        }
    }

    pub(crate) fn remove(&self, cid: ConnId) -> bool {
        self.lock().remove(&cid).is_some()
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    /// Закрывает все сокеты и очищает реестр; возвращает число закрытых
    pub(crate) fn shutdown_all(&self) -> usize {
        let conns: Vec<(ConnId, TcpStream)> = self.lock().drain().collect();
        for (cid, stream) in &conns {
            if let Err(e) = stream.shutdown(Shutdown::Both) {
                debug!("connection {cid} already closed: {e}");
            }
        }
        conns.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::net::TcpListener;

    // пара соединённых сокетов: (серверная сторона, клиентская)
    fn pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (server, _) = listener.accept().unwrap();
        (server, client)
    }

    #[test]
    fn add_ok_and_duplicate_fails() {
        let reg = ConnectionRegistry::new();
        let (a, _ca) = pair();
        let (b, _cb) = pair();

        reg.add(1, a).expect("add should succeed");

        let err = reg.add(1, b).unwrap_err();
        assert!(matches!(err, RegistryError::AlreadyExists(1)));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn remove_returns_bool() {
        let reg = ConnectionRegistry::new();

        // нет такого соединения
        assert!(!reg.remove(42));

        let (s, _c) = pair();
        reg.add(42, s).unwrap();
        assert!(reg.remove(42));

        // уже удалено
        assert!(!reg.remove(42));
    }

    #[test]
    fn shutdown_all_closes_sockets() {
        let reg = ConnectionRegistry::new();
        let (s, mut client) = pair();
        reg.add(1, s).unwrap();

        assert_eq!(reg.shutdown_all(), 1);
        assert_eq!(reg.len(), 0);

        // сервер закрыл сокет -> клиент читает EOF
        let mut buf = [0u8; 1];
        assert_eq!(client.read(&mut buf).unwrap(), 0);
    }
}
