//! 宿主端口分配
//!
//! 分配是对一次容器列表快照的纯计算，不做预留：两个并发的启动请求可能拿到同一个端口，
//! 此时由引擎的绑定失败兜底，作为启动错误返回给调用方

use std::collections::HashSet;

use crate::domain::ContainerSummary;

/// 汇总所有容器已发布的宿主端口，再加上保留端口（本服务自身的监听端口）
pub fn used_ports(containers: &[ContainerSummary], reserved: &[u16]) -> HashSet<u16> {
    containers
        .iter()
        .flat_map(ContainerSummary::public_ports)
        .chain(reserved.iter().copied())
        .collect()
}

/// 从 `start` 向上找第一个未被占用的端口
///
/// 到 65535 仍找不到时返回 `None`
pub fn allocate(used: &HashSet<u16>, start: u16) -> Option<u16> {
    (start..=u16::MAX).find(|port| !used.contains(port))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn container(ports: &str) -> ContainerSummary {
        ContainerSummary {
            id: "c".to_string(),
            ports: ports.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_skips_bound_ports() {
        let containers = vec![
            container("0.0.0.0:8080->80/tcp, :::8080->80/tcp"),
            container("0.0.0.0:8081->80/tcp"),
        ];
        let used = used_ports(&containers, &[3000]);
        assert_eq!(allocate(&used, 8080), Some(8082));
    }

    #[test]
    fn test_reserved_port_is_never_returned() {
        let used = used_ports(&[], &[3000]);
        assert_eq!(allocate(&used, 3000), Some(3001));
    }

    #[test]
    fn test_returns_start_when_free() {
        let used = used_ports(&[container("0.0.0.0:9000->80/tcp")], &[]);
        assert_eq!(allocate(&used, 8080), Some(8080));
    }

    #[test]
    fn test_gaps_are_reused() {
        let used: HashSet<u16> = [8080, 8082, 8083].into_iter().collect();
        assert_eq!(allocate(&used, 8080), Some(8081));
    }

    #[test]
    fn test_exhausted_range() {
        let used: HashSet<u16> = [65534, 65535].into_iter().collect();
        assert_eq!(allocate(&used, 65534), None);
        assert_eq!(allocate(&HashSet::new(), u16::MAX), Some(u16::MAX));
    }

    #[test]
    fn test_smallest_free_port_above_start() {
        // 对若干集合校验：结果不在集合中、不小于起点、且是满足条件的最小值
        let sets: Vec<HashSet<u16>> = vec![
            HashSet::new(),
            [8080].into_iter().collect(),
            (8080..8100).collect(),
            [8079, 8081, 8083].into_iter().collect(),
        ];

        for used in sets {
            let port = allocate(&used, 8080).unwrap();
            assert!(!used.contains(&port));
            assert!(port >= 8080);
            assert!((8080..port).all(|p| used.contains(&p)));
        }
    }
}
